//! Builds without a toolchain
//!
//! Emits placeholder binaries so the rest of the pipeline (store handoff,
//! archiving, release wiring) can be exercised on a machine with none of the
//! cross toolchains installed. A fail list lets callers simulate a target
//! whose compile blew up.

use axoasset::LocalAsset;
use camino::Utf8PathBuf;

use crate::errors::*;
use crate::targets::TargetSpec;
use crate::tasks::RunGraph;

/// Pretend to build one target
pub fn build_fake_target(
    graph: &RunGraph,
    target: &TargetSpec,
    fail: &[String],
) -> ShipResult<Utf8PathBuf> {
    if fail.contains(&target.id) {
        return Err(ShipError::BuildFailed {
            target: target.id.clone(),
            reason: "simulated toolchain failure".to_owned(),
        });
    }
    let dest = graph
        .dist_dir
        .join("bin")
        .join(&target.artifact_tag)
        .join(target.bin_file_name(&graph.bin_name));
    let path = LocalAsset::write_new_all("", &dest)?;
    Ok(path)
}
