//! Errors!

use miette::Diagnostic;
use thiserror::Error;

/// An alias for the common Result type of this crate
pub type ShipResult<T> = std::result::Result<T, ShipError>;

/// Errors shipwright can have
#[derive(Debug, Error, Diagnostic)]
pub enum ShipError {
    /// Any error from doing file/archive stuff
    #[error(transparent)]
    #[diagnostic(transparent)]
    Asset(#[from] axoasset::AxoassetError),

    /// Any error from running an external command
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cmd(#[from] axoprocess::AxoprocessError),

    /// Any error from parsing the announcement tag
    #[error(transparent)]
    #[diagnostic(transparent)]
    Tag(#[from] axotag::errors::TagError),

    /// Any error from asking cargo about the workspace
    #[error(transparent)]
    CargoMetadata(#[from] cargo_metadata::Error),

    /// Two matrix entries used the same id
    #[error("two targets in the matrix are both named {id}")]
    #[diagnostic(help("target ids key the whole pipeline, give each entry its own"))]
    DuplicateTargetId {
        /// the offending id
        id: String,
    },

    /// Two matrix entries used the same artifact tag
    #[error("two targets in the matrix share the artifact tag {artifact_tag}")]
    #[diagnostic(help(
        "artifact tags name both the build handoff and the uploaded asset, so they must be unique"
    ))]
    DuplicateArtifactTag {
        /// the offending tag
        artifact_tag: String,
    },

    /// Asked to operate on a target the matrix doesn't know
    #[error("unknown target {id}")]
    #[diagnostic(help("known targets: {known}"))]
    UnknownTarget {
        /// the id we were given
        id: String,
        /// comma-separated ids the matrix does define
        known: String,
    },

    /// A compile failed (per-target, doesn't kill the run)
    #[error("build failed for {target}: {reason}")]
    BuildFailed {
        /// matrix id of the target
        target: String,
        /// what the toolchain told us
        reason: String,
    },

    /// cargo claimed success but never reported the binary we wanted
    #[error("cargo built {target} but never produced a binary named {bin_name}")]
    #[diagnostic(help("is bin-name in shipwright.toml the name of a [[bin]] in this workspace?"))]
    MissingBinary {
        /// matrix id of the target
        target: String,
        /// the binary we were looking for
        bin_name: String,
    },

    /// The configured strip tool failed on a built binary
    #[error("failed to strip symbols from the {target} binary: {reason}")]
    StripFailed {
        /// matrix id of the target
        target: String,
        /// what the strip tool told us
        reason: String,
    },

    /// Couldn't create the release record (fatal: no assets get uploaded)
    #[error("failed to create a release for {tag}: {reason}")]
    #[diagnostic(help("nothing was uploaded; rerun once the release host is reachable"))]
    ReleaseCreation {
        /// the tag we tried to release
        tag: String,
        /// what the host told us
        reason: String,
    },

    /// A packaging job found no artifact to package (target gets skipped)
    #[error("no build artifact for {artifact_tag}")]
    ArtifactMissing {
        /// the artifact-store key that came up empty
        artifact_tag: String,
    },

    /// An asset upload failed even after retrying
    ///
    /// Distinct from a build failure: the archive exists on disk, it just
    /// never made it onto the release.
    #[error("failed to upload {asset_name} to the {tag} release: {reason}")]
    #[diagnostic(help("the archive still exists locally, only the upload failed"))]
    Upload {
        /// filename of the asset
        asset_name: String,
        /// the release it should have landed on
        tag: String,
        /// what the host told us
        reason: String,
    },

    /// Couldn't mark a built binary executable before archiving it
    #[error("failed to mark {path} executable")]
    Chmod {
        /// the binary we were touching up
        path: String,
        /// what the OS told us
        #[source]
        details: std::io::Error,
    },

    /// Two build jobs published an artifact under one tag
    #[error("two build jobs published an artifact under {artifact_tag}")]
    DoublePublish {
        /// the contested key
        artifact_tag: String,
    },

    /// A step's supervising thread died; treated like any other step failure
    #[error("step {step} panicked")]
    StepPanicked {
        /// id of the step that died
        step: String,
    },

    /// A pre-publish validation check failed
    #[error("validation failed during {check}: {reason}")]
    #[diagnostic(help("publish-class tasks refuse to run until `shipwright task validate` passes"))]
    Validation {
        /// which check tripped
        check: String,
        /// what it reported
        reason: String,
    },

    /// Couldn't figure out which binary this workspace releases
    #[error("couldn't find a binary to release")]
    #[diagnostic(help(
        "set bin-name in shipwright.toml, or run inside a cargo workspace with a root package"
    ))]
    NoBinName,

    /// No tag was provided and none could be inferred
    #[error("no tag to release")]
    #[diagnostic(help("pass --tag vX.Y.Z (tag pushes provide this automatically)"))]
    NoTag,

    /// `cargo -vV` didn't tell us what the host triple is
    #[error("couldn't detect the host target triple from `cargo -vV`")]
    HostTargetUnknown,

    /// The run finished but not every target made it onto the release
    #[error("release run for {tag} finished {outcome}")]
    #[diagnostic(help("see the per-target table above (or run-report.json) for what failed"))]
    RunIncomplete {
        /// the tag we were releasing
        tag: String,
        /// partial or aborted
        outcome: shipwright_schema::RunOutcome,
    },
}
