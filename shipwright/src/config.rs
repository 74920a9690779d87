//! Loading and resolving shipwright's configuration
//!
//! Configuration comes from `shipwright.toml` at the workspace root (all
//! fields optional), overlaid with CLI flags. Everything here resolves into
//! a [`Config`][], which is what the rest of the crate consumes.

use axoasset::SourceFile;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::errors::*;
use crate::targets::{self, TargetSpec};

/// Name of the config file we look for at the workspace root
pub const CONFIG_FILE: &str = "shipwright.toml";

/// What to do with the rest of the run when one target's build fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum FailurePolicy {
    /// Keep going: create the release and package every target that built
    #[default]
    BestEffort,
    /// Stop packaging entirely: a partial matrix shouldn't ship anything
    FailFast,
}

/// How build steps get executed
#[derive(Debug, Clone, Default)]
pub enum BuildMode {
    /// Actually invoke cargo
    #[default]
    Cargo,
    /// Emit placeholder binaries without a toolchain (pipeline smoke tests)
    Fake {
        /// target ids that should pretend their compile failed
        fail: Vec<String>,
    },
}

/// A run's fully-resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// The binary this project releases
    pub bin_name: String,
    /// The tag being released
    pub tag: String,
    /// The (validated, possibly filtered) target matrix
    pub targets: Vec<TargetSpec>,
    /// What a partial build failure does to the rest of the run
    pub policy: FailurePolicy,
    /// Scratch + output dir for this run (fresh artifact store lives here)
    pub dist_dir: Utf8PathBuf,
    /// Real builds or placeholders
    pub build_mode: BuildMode,
}

/// Raw contents of `shipwright.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Overrides the binary name (defaults to the workspace's root package)
    pub bin_name: Option<String>,
    /// Overrides the partial-failure policy (defaults to best-effort)
    pub failure_policy: Option<FailurePolicy>,
    /// Replaces the built-in target matrix wholesale
    #[serde(default)]
    #[serde(rename = "target")]
    pub targets: Vec<TargetSpec>,
}

impl ConfigFile {
    /// Load `shipwright.toml` from the given dir, or defaults if there isn't one
    pub fn load(workspace_root: &Utf8Path) -> ShipResult<Self> {
        let path = workspace_root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let file = SourceFile::load_local(&path)?;
        let config = file.deserialize_toml()?;
        Ok(config)
    }
}

/// CLI-level knobs that feed into [`Config::resolve`][]
#[derive(Debug, Default)]
pub struct ResolveArgs {
    /// The tag to release; None means "infer v{version} from the root package"
    pub tag: Option<String>,
    /// Restrict the run to these matrix ids (empty = whole matrix)
    pub only_targets: Vec<String>,
    /// Override the configured failure policy
    pub policy: Option<FailurePolicy>,
    /// Real or placeholder builds
    pub build_mode: BuildMode,
}

impl Config {
    /// Resolve the full config for the current workspace
    ///
    /// Asks cargo about the workspace (root package name/version, target dir),
    /// loads `shipwright.toml`, and overlays the CLI args.
    pub fn resolve(args: ResolveArgs) -> ShipResult<Self> {
        let metadata = cargo_metadata::MetadataCommand::new().no_deps().exec()?;
        let file = ConfigFile::load(&metadata.workspace_root)?;

        let root_package = metadata.root_package();
        let bin_name = file
            .bin_name
            .or_else(|| root_package.map(|p| p.name.clone()))
            .ok_or(ShipError::NoBinName)?;
        let tag = match args.tag {
            Some(tag) => tag,
            None => root_package
                .map(|p| format!("v{}", p.version))
                .ok_or(ShipError::NoTag)?,
        };

        let matrix = if file.targets.is_empty() {
            targets::default_matrix()
        } else {
            file.targets
        };
        targets::validate_matrix(&matrix)?;
        let selected = targets::select_targets(matrix, &args.only_targets)?;

        Ok(Config {
            bin_name,
            tag,
            targets: selected,
            policy: args.policy.or(file.failure_policy).unwrap_or_default(),
            dist_dir: metadata.target_directory.join("shipwright"),
            build_mode: args.build_mode,
        })
    }
}
