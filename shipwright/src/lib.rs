#![deny(missing_docs)]
#![allow(clippy::result_large_err)]

//! # shipwright
//!
//! This is the library at the core of the `shipwright` CLI. One invocation
//! takes one tagged revision and turns it into one immutable release with a
//! downloadable asset per matrix target: cross-compile everything in
//! parallel, strip, archive (tar.xz for unix-family, zip for windows-family),
//! and attach each archive to the release.
//!
//! The interesting part is the step graph: builds and release-creation run
//! concurrently, each target's packaging waits on exactly its own build plus
//! the release record, and one target's failure never takes down a sibling.
//! See [`tasks::gather_work`][] for how the graph is laid out and
//! [`execute_run`][] for how it's walked.

use std::sync::OnceLock;

use axoasset::LocalAsset;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;
use shipwright_schema::{RunOutcome, RunReport, TargetReport, TargetStatus};
use tracing::info;

use errors::*;
use release::{DryRunHost, GithubHost, ReleaseHandle, ReleaseHost};
pub use tasks::*;

pub mod artifacts;
pub mod build;
pub mod config;
pub mod errors;
pub mod package;
pub mod release;
pub mod runner;
pub mod targets;
pub mod tasks;
#[cfg(test)]
mod tests;

use artifacts::ArtifactStore;
use config::{BuildMode, Config, FailurePolicy};

/// shipwright run -- build the matrix, create the release, attach the assets
pub fn do_run(cfg: &Config) -> ShipResult<RunReport> {
    let tools = Tools::discover()?;
    let graph = gather_work(cfg, tools)?;
    let store = ArtifactStore::default();
    // Fake builds never touch the real release host
    let host: Box<dyn ReleaseHost> = match cfg.build_mode {
        BuildMode::Cargo => Box::new(GithubHost::new()),
        BuildMode::Fake { .. } => Box::new(DryRunHost),
    };

    let report = execute_run(&graph, &store, host.as_ref())?;

    LocalAsset::create_dir_all(&graph.dist_dir)?;
    let json = serde_json::to_string_pretty(&report)
        .expect("run report wasn't serializable!?");
    LocalAsset::write_new(&json, graph.dist_dir.join("run-report.json"))?;
    print_report(&report);
    Ok(report)
}

/// shipwright plan -- report what a run would do without doing any of it
pub fn do_plan(cfg: &Config) -> ShipResult<RunPlan> {
    let tools = Tools::discover()?;
    let graph = gather_work(cfg, tools)?;
    Ok(RunPlan::from_graph(&graph))
}

/// What one step ended up doing
#[derive(Debug)]
pub enum StepOutcome {
    /// The step did its thing
    Success,
    /// The step ran and failed
    Failure(ShipError),
    /// The step never ran
    Skipped(String),
}

impl StepOutcome {
    fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success)
    }
}

/// Shared state the steps of one run operate on
struct RunCtx<'a> {
    graph: &'a RunGraph,
    store: &'a ArtifactStore,
    host: &'a dyn ReleaseHost,
    /// Written once by the create-release step, read by every packaging step.
    /// The dependency edges are what make that ordering safe.
    release: OnceLock<ReleaseHandle>,
}

/// Walk the step graph and produce the run report
///
/// The scheduler is deliberately dumb: group the steps into topological
/// levels, run each level's steps on their own threads, block until the
/// level drains, repeat. All ordering knowledge lives in the graph's edges;
/// nothing here special-cases a stage.
pub fn execute_run(
    graph: &RunGraph,
    store: &ArtifactStore,
    host: &dyn ReleaseHost,
) -> ShipResult<RunReport> {
    let ctx = RunCtx {
        graph,
        store,
        host,
        release: OnceLock::new(),
    };

    let mut outcomes: Vec<Option<StepOutcome>> = vec![];
    outcomes.resize_with(graph.steps.len(), || None);

    for level in graph.levels() {
        // Decide which steps of this level can run at all
        let mut runnable = vec![];
        for &idx in &level {
            match skip_reason(&ctx, &outcomes, idx) {
                Some(reason) => {
                    info!("skipping {}: {reason}", graph.step(idx).id);
                    outcomes[idx.0] = Some(StepOutcome::Skipped(reason));
                }
                None => runnable.push(idx),
            }
        }

        // Everything left is mutually unordered: one thread per step, and
        // each step is just a supervisor for its own external processes
        let ctx = &ctx;
        let results: Vec<(StepIdx, StepOutcome)> = std::thread::scope(|scope| {
            let handles: Vec<_> = runnable
                .iter()
                .map(|&idx| (idx, scope.spawn(move || run_step(ctx, idx))))
                .collect();
            handles
                .into_iter()
                .map(|(idx, handle)| {
                    let outcome = handle.join().unwrap_or_else(|_| {
                        StepOutcome::Failure(ShipError::StepPanicked {
                            step: ctx.graph.step(idx).id.clone(),
                        })
                    });
                    (idx, outcome)
                })
                .collect()
        });
        for (idx, outcome) in results {
            if let StepOutcome::Failure(error) = &outcome {
                info!("step {} failed: {error}", graph.step(idx).id);
            }
            outcomes[idx.0] = Some(outcome);
        }
    }

    Ok(build_report(graph, &ctx, &outcomes))
}

/// Whether a step must be skipped given what already happened
fn skip_reason(
    ctx: &RunCtx<'_>,
    outcomes: &[Option<StepOutcome>],
    idx: StepIdx,
) -> Option<String> {
    let step = ctx.graph.step(idx);
    for &need in &step.needs {
        let done = outcomes[need.0].as_ref();
        match done {
            Some(outcome) if outcome.is_success() => {}
            _ => return Some(format!("{} did not complete", ctx.graph.step(need).id)),
        }
    }
    // fail-fast: one bad build means nothing ships
    if ctx.graph.policy == FailurePolicy::FailFast
        && matches!(step.kind, StepKind::Package(_))
        && outcomes
            .iter()
            .flatten()
            .any(|o| matches!(o, StepOutcome::Failure(_)))
    {
        return Some("fail-fast: an earlier step failed".to_owned());
    }
    None
}

/// Run one step of the graph
fn run_step(ctx: &RunCtx<'_>, idx: StepIdx) -> StepOutcome {
    let step = ctx.graph.step(idx);
    let result = match &step.kind {
        StepKind::Build(target) => {
            build::run_build(ctx.graph, ctx.store, ctx.graph.target(*target))
        }
        StepKind::CreateRelease => ctx
            .host
            .ensure_release(&ctx.graph.tag, &ctx.graph.title)
            .map(|handle| {
                ctx.release
                    .set(handle)
                    .expect("release created twice in one run!?");
            }),
        StepKind::Package(target) => {
            let release = ctx
                .release
                .get()
                .expect("packaging scheduled before the release existed!?");
            package::package_and_upload(
                ctx.graph,
                ctx.store,
                ctx.host,
                release,
                ctx.graph.target(*target),
            )
            .map(|_| ())
        }
    };
    match result {
        Ok(()) => StepOutcome::Success,
        Err(error) => StepOutcome::Failure(error),
    }
}

/// Fold the step outcomes into the per-target report
fn build_report(
    graph: &RunGraph,
    ctx: &RunCtx<'_>,
    outcomes: &[Option<StepOutcome>],
) -> RunReport {
    // find each target's build/package outcome by walking the steps
    let mut builds: Vec<Option<&StepOutcome>> = vec![None; graph.targets.len()];
    let mut packages: Vec<Option<&StepOutcome>> = vec![None; graph.targets.len()];
    let mut release_outcome = None;
    for (step, outcome) in graph.steps.iter().zip(outcomes) {
        let outcome = outcome.as_ref();
        match step.kind {
            StepKind::Build(target) => builds[target.0] = outcome,
            StepKind::Package(target) => packages[target.0] = outcome,
            StepKind::CreateRelease => release_outcome = outcome,
        }
    }
    let release_created = ctx.release.get().is_some();

    let mut targets = vec![];
    for (idx, spec) in graph.targets.iter().enumerate() {
        let (status, reason) = match (builds[idx], packages[idx]) {
            (Some(StepOutcome::Failure(error)), _) => {
                (TargetStatus::BuildFailed, Some(error.to_string()))
            }
            (_, Some(StepOutcome::Success)) => (TargetStatus::Packaged, None),
            (_, Some(StepOutcome::Failure(error))) => {
                let status = match error {
                    ShipError::Upload { .. } => TargetStatus::UploadFailed,
                    ShipError::ArtifactMissing { .. } => TargetStatus::Skipped,
                    _ => TargetStatus::PackageFailed,
                };
                (status, Some(error.to_string()))
            }
            (_, Some(StepOutcome::Skipped(reason))) => {
                (TargetStatus::Skipped, Some(reason.clone()))
            }
            _ => (TargetStatus::Skipped, Some("never scheduled".to_owned())),
        };
        let packaged = status == TargetStatus::Packaged;
        targets.push(TargetReport {
            id: spec.id.clone(),
            triple: spec.triple.clone(),
            status,
            asset_name: packaged.then(|| spec.asset_name(&graph.bin_name)),
            content_type: packaged.then(|| spec.archive.content_type().to_owned()),
            reason,
        });
    }

    let release_failed = matches!(release_outcome, Some(StepOutcome::Failure(_)));
    let any_build_failed = builds
        .iter()
        .any(|o| matches!(o, Some(StepOutcome::Failure(_))));
    let all_packaged = targets
        .iter()
        .all(|t| t.status == TargetStatus::Packaged);
    let outcome = if release_failed || (graph.policy == FailurePolicy::FailFast && any_build_failed)
    {
        RunOutcome::Aborted
    } else if all_packaged {
        RunOutcome::Complete
    } else {
        RunOutcome::Partial
    };

    RunReport {
        shipwright_version: Some(env!("CARGO_PKG_VERSION").to_owned()),
        tag: graph.tag.clone(),
        version: graph.version.to_string(),
        bin_name: graph.bin_name.clone(),
        release_created,
        outcome,
        targets,
    }
}

/// Print the per-target table
///
/// A run never reports a single pass/fail bit for the whole matrix; this
/// table is the user-facing version of that rule.
pub fn print_report(report: &RunReport) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(["target", "triple", "status", "asset"]);
    for target in &report.targets {
        let status = match &target.reason {
            Some(reason) => format!("{} ({reason})", target.status),
            None => target.status.to_string(),
        };
        table.add_row([
            target.id.as_str(),
            target.triple.as_str(),
            status.as_str(),
            target.asset_name.as_deref().unwrap_or("-"),
        ]);
    }
    eprintln!("{table}");
    eprintln!("release run for {}: {}", report.tag, report.outcome);
}

/// What `shipwright plan` reports: the steps and the assets a run would produce
#[derive(Debug, Serialize)]
pub struct RunPlan {
    /// The tag the plan was computed for
    pub tag: String,
    /// Every step, with the steps it waits on
    pub steps: Vec<PlanStep>,
    /// Every asset a fully-successful run would attach
    pub assets: Vec<PlanAsset>,
}

/// One step of the plan
#[derive(Debug, Serialize)]
pub struct PlanStep {
    /// The step's id
    pub id: String,
    /// Ids of the steps it waits on
    pub needs: Vec<String>,
}

/// One asset of the plan
#[derive(Debug, Serialize)]
pub struct PlanAsset {
    /// Matrix id of the target
    pub target: String,
    /// The `{bin_name}-{artifact_tag}.{ext}` filename
    pub file_name: String,
    /// The content type it would be uploaded with
    pub content_type: String,
}

impl RunPlan {
    /// Summarize a computed graph
    pub fn from_graph(graph: &RunGraph) -> Self {
        let steps = graph
            .steps
            .iter()
            .map(|step| PlanStep {
                id: step.id.clone(),
                needs: step
                    .needs
                    .iter()
                    .map(|&need| graph.step(need).id.clone())
                    .collect(),
            })
            .collect();
        let assets = graph
            .targets
            .iter()
            .map(|target| PlanAsset {
                target: target.id.clone(),
                file_name: target.asset_name(&graph.bin_name),
                content_type: target.archive.content_type().to_owned(),
            })
            .collect();
        RunPlan {
            tag: graph.tag.clone(),
            steps,
            assets,
        }
    }
}
