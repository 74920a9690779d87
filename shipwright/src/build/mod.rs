//! Compiling Things
//!
//! One build job per matrix entry. A job compiles the binary for its target,
//! strips symbols if the entry configures a strip tool, and publishes the
//! finished binary into the artifact store under the entry's artifact tag.
//! Jobs are isolated from each other (separate build dirs, separate
//! processes), so one target's toolchain disaster can't corrupt a sibling's.

use axoprocess::Cmd;
use camino::Utf8Path;

use crate::artifacts::{ArtifactHandle, ArtifactStore};
use crate::config::BuildMode;
use crate::errors::*;
use crate::targets::TargetSpec;
use crate::tasks::RunGraph;

pub mod cargo;
pub mod fake;

/// Build one target and hand the result to the artifact store
///
/// Exactly one of these runs per matrix entry per run. An `Err` here is that
/// target's `Failure(reason)` -- the scheduler records it and moves on, it
/// never aborts sibling builds.
pub fn run_build(graph: &RunGraph, store: &ArtifactStore, target: &TargetSpec) -> ShipResult<()> {
    let binary = match &graph.build_mode {
        BuildMode::Cargo => {
            let binary = cargo::build_cargo_target(graph, target)?;
            // The binary must be fully post-processed before anyone else sees it
            if let Some(tool) = &target.strip_tool {
                strip_binary(tool, &binary, target)?;
            }
            binary
        }
        // placeholder binaries have no symbols to strip
        BuildMode::Fake { fail } => fake::build_fake_target(graph, target, fail)?,
    };

    store.publish(ArtifactHandle {
        artifact_tag: target.artifact_tag.clone(),
        path: binary,
    })?;
    Ok(())
}

/// Strip debug symbols with the target's configured (cross-)strip tool
fn strip_binary(tool: &str, binary: &Utf8Path, target: &TargetSpec) -> ShipResult<()> {
    Cmd::new(tool, format!("strip symbols from the {} binary", target.id))
        .arg(binary)
        .run()
        .map_err(|cause| ShipError::StripFailed {
            target: target.id.clone(),
            reason: cause.to_string(),
        })?;
    Ok(())
}
