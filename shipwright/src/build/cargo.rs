//! Functionality required to invoke `cargo build` properly

use std::process::Stdio;

use axoasset::LocalAsset;
use axoprocess::Cmd;
use camino::Utf8PathBuf;
use miette::IntoDiagnostic;
use tracing::warn;

use crate::errors::*;
use crate::targets::TargetSpec;
use crate::tasks::RunGraph;

/// Build one target with cargo and return the path of the finished binary
///
/// Each target gets its own CARGO_TARGET_DIR under the dist dir. Cargo has
/// global state in its target dir that concurrent builds with different
/// flags will clobber, so sibling jobs must never share one.
pub fn build_cargo_target(graph: &RunGraph, target: &TargetSpec) -> ShipResult<Utf8PathBuf> {
    eprintln!("building {} ({})", target.id, target.triple);

    let build_dir = graph.dist_dir.join("builds").join(&target.id);
    let mut command = Cmd::new(
        &graph.tools.cargo.cmd,
        format!("build the {} binary", target.id),
    );
    command
        .arg("build")
        .arg("--release")
        .arg("--message-format=json-render-diagnostics")
        .arg("--target")
        .arg(&target.triple)
        .env("CARGO_TARGET_DIR", &build_dir)
        .stdout(Stdio::piped());
    let mut task = command.spawn()?;

    // Collect up the compiler messages to find out where the binary ended up
    let mut built: Option<Utf8PathBuf> = None;
    let reader = std::io::BufReader::new(task.stdout.take().expect("cargo stdout wasn't piped!?"));
    for message in cargo_metadata::Message::parse_stream(reader) {
        let Ok(message) = message
            .into_diagnostic()
            .map_err(|e| warn!("failed to parse cargo json message: {:?}", e))
        else {
            // It's ok for there to be messages we don't understand if we don't
            // care about them. At the end we check for the one we *do* need.
            continue;
        };
        match message {
            cargo_metadata::Message::CompilerArtifact(artifact) => {
                let Some(new_exe) = artifact.executable else {
                    continue;
                };
                if new_exe.file_stem() == Some(graph.bin_name.as_str()) {
                    built = Some(new_exe);
                }
            }
            _ => {
                // Nothing else interesting?
            }
        }
    }

    let status = task.wait().map_err(|cause| ShipError::BuildFailed {
        target: target.id.clone(),
        reason: format!("couldn't wait on cargo: {cause}"),
    })?;
    if !status.success() {
        return Err(ShipError::BuildFailed {
            target: target.id.clone(),
            reason: format!("cargo exited with {status}"),
        });
    }
    let built = built.ok_or_else(|| ShipError::MissingBinary {
        target: target.id.clone(),
        bin_name: graph.bin_name.clone(),
    })?;

    // Copy the binary into the dist dir so later stages never reach back
    // into cargo's build dirs
    let dest = graph
        .dist_dir
        .join("bin")
        .join(&target.artifact_tag)
        .join(target.bin_file_name(&graph.bin_name));
    LocalAsset::create_dir_all(dest.parent().expect("dist binary path had no parent!?"))?;
    LocalAsset::copy_file_to_file(&built, &dest)?;
    Ok(dest)
}
