//! Mock hosts, canned matrices, and configs for exercising the pipeline
//! without a cross toolchain or a network

use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};

use crate::config::{BuildMode, Config, FailurePolicy};
use crate::errors::*;
use crate::release::{ReleaseHandle, ReleaseHost};
use crate::targets::{ArchiveKind, TargetSpec};
use crate::tasks::{Tool, Tools};

/// Tools that never get probed (fake builds don't invoke any of them)
pub fn mock_tools() -> Tools {
    Tools {
        cargo: Tool {
            cmd: "cargo".to_owned(),
            version: "cargo 1.0.0 (mock)".to_owned(),
        },
        host_target: "x86_64-unknown-linux-gnu".to_owned(),
    }
}

fn linux_target(id: &str) -> TargetSpec {
    TargetSpec {
        id: id.to_owned(),
        triple: format!("{id}-unknown-linux-musl"),
        artifact_tag: id.to_owned(),
        archive: ArchiveKind::TarXz,
        strip_tool: None,
    }
}

fn windows_target() -> TargetSpec {
    TargetSpec {
        id: "x86_64-windows".to_owned(),
        triple: "x86_64-pc-windows-gnu".to_owned(),
        artifact_tag: "x86_64-windows".to_owned(),
        archive: ArchiveKind::Zip,
        strip_tool: None,
    }
}

/// One linux target
pub fn matrix_one() -> Vec<TargetSpec> {
    vec![linux_target("x86_64")]
}

/// A linux target and a windows target
pub fn matrix_linux_windows() -> Vec<TargetSpec> {
    vec![linux_target("x86_64"), windows_target()]
}

/// Two linux targets and a windows target
pub fn matrix_three() -> Vec<TargetSpec> {
    vec![
        linux_target("x86_64"),
        linux_target("armv6"),
        windows_target(),
    ]
}

/// A fake-build config rooted in a scratch dir
pub fn test_config(
    dist_dir: &Utf8Path,
    targets: Vec<TargetSpec>,
    tag: &str,
    fail: Vec<String>,
) -> Config {
    Config {
        bin_name: "templar".to_owned(),
        tag: tag.to_owned(),
        targets,
        policy: FailurePolicy::BestEffort,
        dist_dir: dist_dir.to_owned(),
        build_mode: BuildMode::Fake { fail },
    }
}

/// Utf8 view of a temp dir
pub fn utf8_temp(dir: &temp_dir::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_owned()).expect("temp dir made non-utf8 path!?")
}

/// One recorded upload
#[derive(Debug, Clone)]
pub struct MockUpload {
    pub upload_target: String,
    pub file_name: String,
    pub content_type: String,
}

/// A release host that records instead of publishing
#[derive(Debug, Default)]
pub struct MockHost {
    /// tags of release records that exist
    pub releases: Mutex<Vec<String>>,
    /// every successfully attached asset, in attach order
    pub uploads: Mutex<Vec<MockUpload>>,
    /// make ensure_release fail
    pub fail_create: bool,
    /// make the next N uploads fail
    pub fail_uploads: Mutex<u32>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    pub fn failing_uploads(count: u32) -> Self {
        Self {
            fail_uploads: Mutex::new(count),
            ..Self::default()
        }
    }

    pub fn upload_names(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.file_name.clone())
            .collect()
    }
}

impl ReleaseHost for MockHost {
    fn ensure_release(&self, tag: &str, _title: &str) -> ShipResult<ReleaseHandle> {
        if self.fail_create {
            return Err(ShipError::ReleaseCreation {
                tag: tag.to_owned(),
                reason: "host said no".to_owned(),
            });
        }
        let mut releases = self.releases.lock().unwrap();
        // a retry of the same tag must reuse the record, never duplicate it
        if !releases.iter().any(|r| r == tag) {
            releases.push(tag.to_owned());
        }
        Ok(ReleaseHandle {
            tag_name: tag.to_owned(),
            upload_target: format!("mock://{tag}"),
        })
    }

    fn upload_asset(
        &self,
        release: &ReleaseHandle,
        file_name: &str,
        content_type: &str,
        _path: &Utf8Path,
    ) -> ShipResult<()> {
        {
            let mut remaining = self.fail_uploads.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ShipError::Upload {
                    asset_name: file_name.to_owned(),
                    tag: release.tag_name.clone(),
                    reason: "mock network flake".to_owned(),
                });
            }
        }
        self.uploads.lock().unwrap().push(MockUpload {
            upload_target: release.upload_target.clone(),
            file_name: file_name.to_owned(),
            content_type: content_type.to_owned(),
        });
        Ok(())
    }
}
