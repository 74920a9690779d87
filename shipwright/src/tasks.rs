//! Computing the work a release run will do
//!
//! [`gather_work`][] precomputes every step of a run before anything executes:
//! it validates the matrix, parses the announcement tag, and lays the steps
//! out as a DAG with explicit prerequisite edges. Roughly:
//!
//! 1. one Build step per matrix entry (no prerequisites)
//! 2. one CreateRelease step (no prerequisites -- it races the builds on purpose)
//! 3. one Package step per matrix entry, needing that entry's Build step
//!    *and* the CreateRelease step
//!
//! Precomputing the whole graph is what lets `shipwright plan` report exactly
//! what a run would do without doing it, and it's what makes the ordering
//! guarantees declarative: execution (in lib.rs) just walks topological
//! levels, it never decides ordering on its own.

use axotag::{parse_tag, Package, ReleaseType};
use camino::Utf8PathBuf;
use semver::Version;

use crate::config::{BuildMode, Config, FailurePolicy};
use crate::errors::*;
use crate::targets::{TargetSpec, TargetTriple};

/// A map where the order doesn't matter
pub type FastMap<K, V> = std::collections::HashMap<K, V>;
/// A map where the order matters
pub type SortedMap<K, V> = std::collections::BTreeMap<K, V>;

/// A unique id for a [`TargetSpec`][] in the run's matrix
#[derive(Copy, Clone, PartialEq, PartialOrd, Eq, Ord, Hash, Debug)]
pub struct TargetIdx(pub usize);

/// A unique id for a [`Step`][] in the run graph
#[derive(Copy, Clone, PartialEq, PartialOrd, Eq, Ord, Hash, Debug)]
pub struct StepIdx(pub usize);

/// The graph of all work a run will do
///
/// All work is precomputed at the start of execution because only discovering
/// what you need to do in the middle of building/packaging things is a mess.
/// It also lets us report what *should* happen without actually doing it.
#[derive(Debug)]
pub struct RunGraph {
    /// The binary we're releasing
    pub bin_name: String,
    /// The tag this run is for (e.g. "v1.2.3")
    pub tag: String,
    /// Title of the release record, derived from the tag
    pub title: String,
    /// The version parsed out of the tag
    pub version: Version,
    /// Whether the tag looks like a prerelease
    pub prerelease: bool,
    /// Scratch + output dir for this run
    pub dist_dir: Utf8PathBuf,
    /// What a partial build failure does to the rest of the run
    pub policy: FailurePolicy,
    /// Real builds or placeholders
    pub build_mode: BuildMode,
    /// Tools found on the host
    pub tools: Tools,
    /// The matrix this run operates on
    pub targets: Vec<TargetSpec>,
    /// The schedulable steps, with their prerequisite edges
    pub steps: Vec<Step>,
}

/// One schedulable unit of a run
#[derive(Debug)]
pub struct Step {
    /// Unique human-readable id ("build:armv6", "create-release", ...)
    pub id: String,
    /// What the step does
    pub kind: StepKind,
    /// Steps that must have succeeded before this one may start
    pub needs: Vec<StepIdx>,
}

/// The stages a step can belong to
#[derive(Debug)]
pub enum StepKind {
    /// Compile one target, strip it, publish it into the artifact store
    Build(TargetIdx),
    /// Create the immutable release record all assets attach to
    CreateRelease,
    /// Archive one target's binary and attach it to the release
    Package(TargetIdx),
}

/// Tools we found on the host
#[derive(Debug, Clone, Default)]
pub struct Tools {
    /// cargo, the one tool we can't do without
    pub cargo: Tool,
    /// The target triple of the machine we're running on
    pub host_target: TargetTriple,
}

/// A tool we found on the host
#[derive(Debug, Clone, Default)]
pub struct Tool {
    /// The string to pass to Cmd::new
    pub cmd: String,
    /// The version the tool reported (in case useful)
    pub version: String,
}

impl Tools {
    /// Probe the host for the tools a run needs
    pub fn discover() -> ShipResult<Self> {
        let cargo_cmd = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_owned());
        let output = axoprocess::Cmd::new(&cargo_cmd, "learn about the cargo toolchain")
            .arg("-vV")
            .output()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout.lines().next().unwrap_or_default().to_owned();
        let host_target = stdout
            .lines()
            .find_map(|line| line.strip_prefix("host: "))
            .map(|host| host.trim().to_owned())
            .ok_or(ShipError::HostTargetUnknown)?;
        Ok(Tools {
            cargo: Tool {
                cmd: cargo_cmd,
                version,
            },
            host_target,
        })
    }
}

impl RunGraph {
    /// Get a step
    pub fn step(&self, idx: StepIdx) -> &Step {
        &self.steps[idx.0]
    }

    /// Get a target of the matrix
    pub fn target(&self, idx: TargetIdx) -> &TargetSpec {
        &self.targets[idx.0]
    }

    /// Group the steps into topological levels
    ///
    /// Every step's prerequisites live in a strictly earlier level, so the
    /// scheduler can run a whole level in parallel and block between levels.
    pub fn levels(&self) -> Vec<Vec<StepIdx>> {
        let mut placed = vec![false; self.steps.len()];
        let mut levels: Vec<Vec<StepIdx>> = vec![];
        let mut remaining = self.steps.len();
        while remaining > 0 {
            let level: Vec<StepIdx> = self
                .steps
                .iter()
                .enumerate()
                .filter(|(idx, step)| {
                    !placed[*idx] && step.needs.iter().all(|need| placed[need.0])
                })
                .map(|(idx, _)| StepIdx(idx))
                .collect();
            assert!(!level.is_empty(), "step graph has a cycle!?");
            for idx in &level {
                placed[idx.0] = true;
            }
            remaining -= level.len();
            levels.push(level);
        }
        levels
    }
}

/// Precompute everything a run for this config will do
pub fn gather_work(cfg: &Config, tools: Tools) -> ShipResult<RunGraph> {
    crate::targets::validate_matrix(&cfg.targets)?;

    // Parse the tag up front so a bad tag fails the run before any build starts
    let packages = [Package {
        name: cfg.bin_name.clone(),
        version: None,
    }];
    let announcing = parse_tag(&packages, &cfg.tag)?;
    let version = match announcing.release {
        ReleaseType::Version(version) => version,
        ReleaseType::Package { version, .. } => version,
        ReleaseType::None => {
            return Err(ShipError::NoTag);
        }
    };

    let mut steps = vec![];
    for (idx, target) in cfg.targets.iter().enumerate() {
        steps.push(Step {
            id: format!("build:{}", target.id),
            kind: StepKind::Build(TargetIdx(idx)),
            needs: vec![],
        });
    }
    let release_step = StepIdx(steps.len());
    steps.push(Step {
        id: "create-release".to_owned(),
        kind: StepKind::CreateRelease,
        needs: vec![],
    });
    for idx in 0..cfg.targets.len() {
        steps.push(Step {
            id: format!("package:{}", cfg.targets[idx].id),
            kind: StepKind::Package(TargetIdx(idx)),
            needs: vec![StepIdx(idx), release_step],
        });
    }

    Ok(RunGraph {
        bin_name: cfg.bin_name.clone(),
        tag: cfg.tag.clone(),
        title: cfg.tag.clone(),
        version,
        prerelease: announcing.prerelease,
        dist_dir: cfg.dist_dir.clone(),
        policy: cfg.policy,
        build_mode: cfg.build_mode.clone(),
        tools,
        targets: cfg.targets.clone(),
        steps,
    })
}
