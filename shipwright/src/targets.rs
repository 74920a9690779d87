//! The target matrix
//!
//! A static, ordered table of every platform we cut release binaries for.
//! Everything downstream (build jobs, artifact-store keys, asset filenames)
//! is keyed off these entries, so adding a platform is just adding a row --
//! no other component changes.

use serde::{Deserialize, Serialize};

use crate::errors::*;

/// A rust target-triple (e.g. "x86_64-pc-windows-gnu")
pub type TargetTriple = String;

/// How a target's binary gets bundled for download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveKind {
    /// `.tar.xz`, for unix-family targets
    TarXz,
    /// `.zip`, for windows-family targets
    Zip,
}

impl ArchiveKind {
    /// The file extension this archive kind produces
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveKind::TarXz => "tar.xz",
            ArchiveKind::Zip => "zip",
        }
    }

    /// The content type assets of this kind are uploaded with
    pub fn content_type(self) -> &'static str {
        match self {
            ArchiveKind::TarXz => "application/x-gtar",
            ArchiveKind::Zip => "application/zip",
        }
    }
}

/// One platform we cut release binaries for
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetSpec {
    /// Unique name for this entry ("x86_64", "armv6", ...)
    pub id: String,
    /// The triple rustc compiles for
    pub triple: TargetTriple,
    /// Unique tag used both as the artifact-store key and in asset filenames
    pub artifact_tag: String,
    /// Archive format for the packaged asset
    pub archive: ArchiveKind,
    /// Cross strip binary, for targets whose binaries need symbols stripped
    /// before packaging
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strip_tool: Option<String>,
}

impl TargetSpec {
    /// Whether this entry targets a windows-family platform
    pub fn is_windows(&self) -> bool {
        self.triple.contains("-windows-")
    }

    /// The file name the built binary has ("templar", or "templar.exe" on windows)
    pub fn bin_file_name(&self, bin_name: &str) -> String {
        if self.is_windows() {
            format!("{bin_name}.exe")
        } else {
            bin_name.to_owned()
        }
    }

    /// The asset filename for this target: `{bin_name}-{artifact_tag}.{ext}`
    ///
    /// This is a stable contract -- people script their downloads against it.
    pub fn asset_name(&self, bin_name: &str) -> String {
        format!(
            "{bin_name}-{}.{}",
            self.artifact_tag,
            self.archive.extension()
        )
    }
}

/// The built-in matrix: the static-linking musl family plus windows
pub fn default_matrix() -> Vec<TargetSpec> {
    vec![
        TargetSpec {
            id: "x86_64".to_owned(),
            triple: "x86_64-unknown-linux-musl".to_owned(),
            artifact_tag: "x86_64".to_owned(),
            archive: ArchiveKind::TarXz,
            strip_tool: Some("strip".to_owned()),
        },
        TargetSpec {
            id: "aarch64".to_owned(),
            triple: "aarch64-unknown-linux-musl".to_owned(),
            artifact_tag: "aarch64".to_owned(),
            archive: ArchiveKind::TarXz,
            strip_tool: Some("aarch64-linux-musl-strip".to_owned()),
        },
        TargetSpec {
            id: "armv7".to_owned(),
            triple: "armv7-unknown-linux-musleabihf".to_owned(),
            artifact_tag: "armv7".to_owned(),
            archive: ArchiveKind::TarXz,
            strip_tool: Some("arm-linux-musleabihf-strip".to_owned()),
        },
        TargetSpec {
            id: "armv6".to_owned(),
            triple: "arm-unknown-linux-musleabi".to_owned(),
            artifact_tag: "armv6".to_owned(),
            archive: ArchiveKind::TarXz,
            strip_tool: Some("arm-linux-musleabi-strip".to_owned()),
        },
        TargetSpec {
            id: "x86_64-windows".to_owned(),
            triple: "x86_64-pc-windows-gnu".to_owned(),
            artifact_tag: "x86_64-windows".to_owned(),
            archive: ArchiveKind::Zip,
            strip_tool: None,
        },
    ]
}

/// Check the matrix invariants: `id` and `artifact_tag` are unique
pub fn validate_matrix(matrix: &[TargetSpec]) -> ShipResult<()> {
    let mut ids = std::collections::BTreeSet::new();
    let mut tags = std::collections::BTreeSet::new();
    for target in matrix {
        if !ids.insert(&target.id) {
            return Err(ShipError::DuplicateTargetId {
                id: target.id.clone(),
            });
        }
        if !tags.insert(&target.artifact_tag) {
            return Err(ShipError::DuplicateArtifactTag {
                artifact_tag: target.artifact_tag.clone(),
            });
        }
    }
    Ok(())
}

/// Select a subset of the matrix by id, preserving matrix order
///
/// An empty selection means "the whole matrix".
pub fn select_targets(matrix: Vec<TargetSpec>, only: &[String]) -> ShipResult<Vec<TargetSpec>> {
    if only.is_empty() {
        return Ok(matrix);
    }
    for id in only {
        if !matrix.iter().any(|t| &t.id == id) {
            let known = matrix
                .iter()
                .map(|t| t.id.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ShipError::UnknownTarget {
                id: id.clone(),
                known,
            });
        }
    }
    Ok(matrix
        .into_iter()
        .filter(|t| only.contains(&t.id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matrix_is_valid() {
        let matrix = default_matrix();
        validate_matrix(&matrix).unwrap();
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut matrix = default_matrix();
        matrix[1].id = matrix[0].id.clone();
        assert!(matches!(
            validate_matrix(&matrix),
            Err(ShipError::DuplicateTargetId { .. })
        ));
    }

    #[test]
    fn duplicate_tags_rejected() {
        let mut matrix = default_matrix();
        matrix[1].artifact_tag = matrix[0].artifact_tag.clone();
        assert!(matches!(
            validate_matrix(&matrix),
            Err(ShipError::DuplicateArtifactTag { .. })
        ));
    }

    #[test]
    fn asset_names_are_deterministic() {
        // the filename is a pure function of (bin_name, artifact_tag, archive)
        let matrix = default_matrix();
        let linux = &matrix[0];
        let windows = matrix.iter().find(|t| t.is_windows()).unwrap();
        assert_eq!(linux.asset_name("templar"), "templar-x86_64.tar.xz");
        assert_eq!(linux.asset_name("templar"), linux.asset_name("templar"));
        assert_eq!(
            windows.asset_name("templar"),
            "templar-x86_64-windows.zip"
        );
    }

    #[test]
    fn windows_binaries_get_exe() {
        let matrix = default_matrix();
        let windows = matrix.iter().find(|t| t.is_windows()).unwrap();
        assert_eq!(windows.bin_file_name("templar"), "templar.exe");
        assert_eq!(matrix[0].bin_file_name("templar"), "templar");
    }

    #[test]
    fn select_subset_preserves_order() {
        let matrix = default_matrix();
        let picked = select_targets(matrix, &["armv6".to_owned(), "x86_64".to_owned()]).unwrap();
        let ids: Vec<_> = picked.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["x86_64", "armv6"]);
    }

    #[test]
    fn select_unknown_target_errors() {
        let matrix = default_matrix();
        assert!(matches!(
            select_targets(matrix, &["riscv".to_owned()]),
            Err(ShipError::UnknownTarget { .. })
        ));
    }
}
