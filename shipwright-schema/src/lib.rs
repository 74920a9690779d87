#![deny(missing_docs)]

//! # shipwright-schema
//!
//! This crate exists to serialize and deserialize the run-report.json produced
//! by shipwright at the end of every release run. It's split out from the main
//! crate so that CI scripts and other external consumers can parse the report
//! without building the whole tool.
//!
//! The root type of the schema is [`RunReport`][].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A report of everything one release run did, per target
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunReport {
    /// The version of shipwright that generated this
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipwright_version: Option<String>,
    /// The git tag this run released (e.g. `v1.2.3`)
    pub tag: String,
    /// The version parsed out of the tag
    pub version: String,
    /// The binary the run built and packaged
    pub bin_name: String,
    /// Whether the release record was successfully created (or already existed)
    pub release_created: bool,
    /// How the run as a whole went
    pub outcome: RunOutcome,
    /// One entry per target in the matrix, in matrix order
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetReport>,
}

impl RunReport {
    /// Whether every target made it all the way to an attached asset
    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, RunOutcome::Complete)
    }
}

/// The overall outcome of a run
///
/// A run never collapses its targets into a single pass/fail bit -- this is
/// only the headline, the per-target truth lives in [`TargetReport`][].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    /// Every target was built, packaged, and attached to the release
    Complete,
    /// The release exists but at least one target didn't make it onto it
    Partial,
    /// The run stopped before attaching anything (release creation failed,
    /// or a fail-fast policy tripped)
    Aborted,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunOutcome::Complete => "complete",
            RunOutcome::Partial => "partial",
            RunOutcome::Aborted => "aborted",
        };
        s.fmt(f)
    }
}

/// What happened to one target of the matrix
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TargetReport {
    /// The matrix id of the target (e.g. `armv6`)
    pub id: String,
    /// The triple the target compiles for
    pub triple: String,
    /// How far this target got
    pub status: TargetStatus,
    /// The asset filename, present whenever the target was packaged
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_name: Option<String>,
    /// The content type the asset was uploaded with
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Why the target failed or was skipped
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// How far one target got through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TargetStatus {
    /// Built, archived, and attached to the release
    Packaged,
    /// The compile (or symbol strip) failed; nothing was packaged
    BuildFailed,
    /// The binary was built but archiving it failed
    PackageFailed,
    /// The archive exists on disk but couldn't be attached to the release
    UploadFailed,
    /// Never attempted (no build artifact, or an upstream stage failed)
    Skipped,
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TargetStatus::Packaged => "packaged",
            TargetStatus::BuildFailed => "build failed",
            TargetStatus::PackageFailed => "package failed",
            TargetStatus::UploadFailed => "upload failed",
            TargetStatus::Skipped => "skipped",
        };
        s.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_headline() {
        let report = RunReport {
            shipwright_version: Some("0.1.0".to_owned()),
            tag: "v1.2.3".to_owned(),
            version: "1.2.3".to_owned(),
            bin_name: "templar".to_owned(),
            release_created: true,
            outcome: RunOutcome::Partial,
            targets: vec![],
        };
        assert!(!report.is_complete());
        assert_eq!(report.outcome.to_string(), "partial");
    }

    #[test]
    fn statuses_serialize_kebab() {
        let json = serde_json::to_string(&TargetStatus::BuildFailed).unwrap();
        assert_eq!(json, r#""build-failed""#);
        let back: TargetStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TargetStatus::BuildFailed);
    }
}
