//! Creating the release record and attaching assets to it
//!
//! One release record per run, created exactly once, then shared read-only by
//! every packaging job. The record itself lives on a [`ReleaseHost`][]; the
//! production host drives the `gh` CLI, tests swap in a recording mock.

use axoprocess::Cmd;
use camino::Utf8Path;
use tracing::{info, warn};

use crate::errors::*;

/// Handle to the release record every packaged asset attaches to
///
/// Holding one of these is proof the release was successfully created: no
/// upload can happen without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseHandle {
    /// The tag the release was created for
    pub tag_name: String,
    /// Where uploads go (for the gh CLI this is the tag itself; mock hosts
    /// use it as a lookup key)
    pub upload_target: String,
}

/// The surface we publish releases through
pub trait ReleaseHost: Sync {
    /// Idempotently create the release record for a tag
    ///
    /// Calling this twice for one tag (operator retry) must return the
    /// existing record's handle or fail loudly -- never mint a duplicate.
    fn ensure_release(&self, tag: &str, title: &str) -> ShipResult<ReleaseHandle>;

    /// Attach one asset to a previously-created release
    fn upload_asset(
        &self,
        release: &ReleaseHandle,
        file_name: &str,
        content_type: &str,
        path: &Utf8Path,
    ) -> ShipResult<()>;
}

/// The gh-CLI-backed production host
#[derive(Debug, Clone)]
pub struct GithubHost {
    /// The gh binary to drive
    pub gh: String,
}

impl GithubHost {
    /// A host driving whatever `gh` is on PATH
    pub fn new() -> Self {
        Self {
            gh: "gh".to_owned(),
        }
    }
}

impl Default for GithubHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseHost for GithubHost {
    fn ensure_release(&self, tag: &str, title: &str) -> ShipResult<ReleaseHandle> {
        // An operator retry of the same tag must find the existing record
        let existing = Cmd::new(&self.gh, format!("check for an existing {tag} release"))
            .arg("release")
            .arg("view")
            .arg(tag)
            .check(false)
            .output()
            .map(|output| output.status.success());
        if let Ok(true) = existing {
            info!("release {tag} already exists, reusing it");
            return Ok(ReleaseHandle {
                tag_name: tag.to_owned(),
                upload_target: tag.to_owned(),
            });
        }

        Cmd::new(&self.gh, format!("create the {tag} release"))
            .arg("release")
            .arg("create")
            .arg(tag)
            .arg("--title")
            .arg(title)
            .arg("--notes")
            .arg("")
            .run()
            .map_err(|cause| ShipError::ReleaseCreation {
                tag: tag.to_owned(),
                reason: cause.to_string(),
            })?;
        Ok(ReleaseHandle {
            tag_name: tag.to_owned(),
            upload_target: tag.to_owned(),
        })
    }

    fn upload_asset(
        &self,
        release: &ReleaseHandle,
        file_name: &str,
        _content_type: &str,
        path: &Utf8Path,
    ) -> ShipResult<()> {
        // gh picks the content type from the file name on the wire; the
        // declared one still travels with the asset in the run report
        Cmd::new(&self.gh, format!("upload {file_name}"))
            .arg("release")
            .arg("upload")
            .arg(&release.upload_target)
            .arg(path)
            .run()?;
        Ok(())
    }
}

/// A host for fake runs: creates nothing, uploads nowhere
#[derive(Debug, Clone, Default)]
pub struct DryRunHost;

impl ReleaseHost for DryRunHost {
    fn ensure_release(&self, tag: &str, _title: &str) -> ShipResult<ReleaseHandle> {
        warn!("dry run: not creating a release for {tag}");
        Ok(ReleaseHandle {
            tag_name: tag.to_owned(),
            upload_target: "dry-run".to_owned(),
        })
    }

    fn upload_asset(
        &self,
        _release: &ReleaseHandle,
        file_name: &str,
        content_type: &str,
        _path: &Utf8Path,
    ) -> ShipResult<()> {
        eprintln!("dry run: would upload {file_name} ({content_type})");
        Ok(())
    }
}
