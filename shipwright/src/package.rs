//! Archiving built binaries and attaching them to the release
//!
//! One packaging job per target. A job only ever starts once its target's
//! build has completed *and* the release record exists -- the step graph
//! enforces both, so everything here can assume its inputs are final.

use axoasset::LocalAsset;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

use crate::artifacts::ArtifactStore;
use crate::errors::*;
use crate::release::{ReleaseHandle, ReleaseHost};
use crate::targets::{ArchiveKind, TargetSpec};
use crate::tasks::RunGraph;

/// A packaged, uploaded asset
#[derive(Debug, Clone)]
pub struct PackagedAsset {
    /// Matrix id of the target this asset was built for
    pub target_id: String,
    /// The asset's filename (the `{bin_name}-{artifact_tag}.{ext}` contract)
    pub file_name: String,
    /// The content type it was uploaded with
    pub content_type: String,
    /// Where the archive lives locally
    pub path: Utf8PathBuf,
}

/// Package one target's binary and attach it to the release
pub fn package_and_upload(
    graph: &RunGraph,
    store: &ArtifactStore,
    host: &dyn ReleaseHost,
    release: &ReleaseHandle,
    target: &TargetSpec,
) -> ShipResult<PackagedAsset> {
    // A missing artifact means the build never delivered; skip this target
    // and leave the rest of the matrix alone
    let Some(artifact) = store.fetch(&target.artifact_tag) else {
        return Err(ShipError::ArtifactMissing {
            artifact_tag: target.artifact_tag.clone(),
        });
    };

    let asset_name = target.asset_name(&graph.bin_name);
    eprintln!("packaging {asset_name}");

    // Binaries come out of a build without the executable bit users expect
    if !target.is_windows() {
        make_executable(&artifact.path)?;
    }

    // Stage the binary alone so the archive root contains exactly the binary
    let stage_dir = graph.dist_dir.join("stage").join(&target.artifact_tag);
    let archive_path = graph.dist_dir.join(&asset_name);
    archive_binary(&artifact.path, &stage_dir, &archive_path, target.archive)?;

    upload_with_retry(host, release, &asset_name, target, &archive_path)?;

    Ok(PackagedAsset {
        target_id: target.id.clone(),
        file_name: asset_name,
        content_type: target.archive.content_type().to_owned(),
        path: archive_path,
    })
}

/// Stage a single binary into a scratch dir and archive it
///
/// Also used by the local `package-tar` task, which archives the host build
/// outside of any release run.
pub fn archive_binary(
    binary: &Utf8Path,
    stage_dir: &Utf8Path,
    archive_path: &Utf8Path,
    kind: ArchiveKind,
) -> ShipResult<()> {
    if stage_dir.exists() {
        LocalAsset::remove_dir_all(stage_dir)?;
    }
    LocalAsset::create_dir_all(stage_dir)?;
    LocalAsset::copy_file_to_dir(binary, stage_dir)?;

    if archive_path.exists() {
        LocalAsset::remove_file(archive_path)?;
    }
    match kind {
        ArchiveKind::TarXz => LocalAsset::tar_xz_dir(stage_dir, archive_path, None::<&Utf8Path>)?,
        ArchiveKind::Zip => LocalAsset::zip_dir(stage_dir, archive_path, None::<&Utf8Path>)?,
    }
    Ok(())
}

/// Attach the asset, retrying the upload once before reporting it
///
/// The release record already exists at this point, so retrying an attach is
/// safe. A second failure surfaces as an UploadError -- the binary was built,
/// it just isn't published, and the report must say so distinctly.
fn upload_with_retry(
    host: &dyn ReleaseHost,
    release: &ReleaseHandle,
    asset_name: &str,
    target: &TargetSpec,
    archive_path: &Utf8Path,
) -> ShipResult<()> {
    let content_type = target.archive.content_type();
    match host.upload_asset(release, asset_name, content_type, archive_path) {
        Ok(()) => Ok(()),
        Err(first) => {
            warn!("upload of {asset_name} failed ({first}), retrying once");
            host.upload_asset(release, asset_name, content_type, archive_path)
                .map_err(|cause| ShipError::Upload {
                    asset_name: asset_name.to_owned(),
                    tag: release.tag_name.clone(),
                    reason: cause.to_string(),
                })
        }
    }
}

/// chmod +x, because tarballs preserve modes and users run what's inside
fn make_executable(path: &Utf8Path) -> ShipResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let chmod_err = |details| ShipError::Chmod {
            path: path.to_string(),
            details,
        };
        let metadata = std::fs::metadata(path).map_err(chmod_err)?;
        let mut perms = metadata.permissions();
        perms.set_mode(perms.mode() | 0o755);
        std::fs::set_permissions(path, perms).map_err(chmod_err)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
