//! The local task runner
//!
//! A small single-machine analogue of the release graph: named tasks with
//! declared prerequisites, resolved depth-first, each task run at most once
//! per invocation no matter how many tasks depend on it. The `validate` task
//! is the gate: every publish-class task (`publish`, `dry-run`, `tag`) sits
//! behind it and fails fast, with no side effects, if it trips.

use axoprocess::Cmd;
use camino::Utf8PathBuf;
use tracing::warn;

use crate::errors::*;
use crate::package;
use crate::targets::{self, ArchiveKind, TargetTriple};
use crate::tasks::Tools;

/// Env var that points `build-release` (and the packaging tasks) at a triple
///
/// Unset means "the host's native triple".
pub const TARGET_ENV_VAR: &str = "SHIPWRIGHT_TARGET";

/// The tasks the runner knows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Task {
    /// A plain debug build
    Build,
    /// An optimized build for the selected target
    BuildRelease,
    /// tar.xz the release binary
    PackageTar,
    /// Build a .deb via cargo-deb
    PackageDeb,
    /// All the packaging
    Package,
    /// Build the docs book
    Book,
    /// Serve the docs book locally
    ServeBook,
    /// The pre-publish gate: tree check, static checks, tests
    Validate,
    /// A registry publish rehearsal
    DryRun,
    /// Cut the version tag
    Tag,
    /// Publish to the registry
    Publish,
}

impl Task {
    /// The task's command-line name
    pub fn name(self) -> &'static str {
        match self {
            Task::Build => "build",
            Task::BuildRelease => "build-release",
            Task::PackageTar => "package-tar",
            Task::PackageDeb => "package-deb",
            Task::Package => "package",
            Task::Book => "book",
            Task::ServeBook => "serve-book",
            Task::Validate => "validate",
            Task::DryRun => "dry-run",
            Task::Tag => "tag",
            Task::Publish => "publish",
        }
    }

    /// Tasks that must run (and pass) before this one
    pub fn prereqs(self) -> &'static [Task] {
        match self {
            Task::Build => &[],
            Task::BuildRelease => &[],
            Task::PackageTar => &[Task::BuildRelease],
            Task::PackageDeb => &[Task::BuildRelease],
            Task::Package => &[Task::PackageTar, Task::PackageDeb],
            Task::Book => &[],
            Task::ServeBook => &[Task::Book],
            Task::Validate => &[],
            // publish-class tasks all sit behind the validation gate
            Task::DryRun => &[Task::Validate],
            Task::Tag => &[Task::Validate],
            Task::Publish => &[Task::Validate],
        }
    }
}

/// Expand a task into its full execution order
///
/// Depth-first over the prerequisite table: prerequisites come before their
/// dependents, and a task shared by several dependents appears exactly once.
pub fn resolve_order(task: Task) -> Vec<Task> {
    let mut order = vec![];
    push_task(task, &mut order);
    order
}

fn push_task(task: Task, order: &mut Vec<Task>) {
    if order.contains(&task) {
        return;
    }
    for &prereq in task.prereqs() {
        push_task(prereq, order);
    }
    order.push(task);
}

/// Run a task and its prerequisites, stopping at the first failure
pub fn run_task(task: Task) -> ShipResult<()> {
    run_task_with(task, exec_task)
}

/// The run loop with the executor split out, so tests can fake it
pub fn run_task_with(
    task: Task,
    mut exec: impl FnMut(Task) -> ShipResult<()>,
) -> ShipResult<()> {
    let order = resolve_order(task);
    let names: Vec<_> = order.iter().map(|t| t.name()).collect();
    eprintln!("running tasks: {}", names.join(", "));
    for task in order {
        eprintln!("== {} ==", task.name());
        exec(task)?;
    }
    Ok(())
}

fn exec_task(task: Task) -> ShipResult<()> {
    match task {
        Task::Build => task_build(),
        Task::BuildRelease => task_build_release(),
        Task::PackageTar => task_package_tar(),
        Task::PackageDeb => task_package_deb(),
        Task::Package => Ok(()),
        Task::Book => task_book(false),
        Task::ServeBook => task_book(true),
        Task::Validate => task_validate(),
        Task::DryRun => task_cargo_publish(true),
        Task::Tag => task_tag(),
        Task::Publish => task_cargo_publish(false),
    }
}

/// The triple the local tasks operate on
fn selected_target(tools: &Tools) -> TargetTriple {
    std::env::var(TARGET_ENV_VAR).unwrap_or_else(|_| tools.host_target.clone())
}

fn task_build() -> ShipResult<()> {
    let tools = Tools::discover()?;
    Cmd::new(&tools.cargo.cmd, "build the workspace")
        .arg("build")
        .arg("--workspace")
        .run()?;
    Ok(())
}

fn task_build_release() -> ShipResult<()> {
    let tools = Tools::discover()?;
    let triple = selected_target(&tools);
    Cmd::new(&tools.cargo.cmd, format!("build a release binary for {triple}"))
        .arg("build")
        .arg("--release")
        .arg("--target")
        .arg(&triple)
        .run()?;
    Ok(())
}

fn task_package_tar() -> ShipResult<()> {
    let tools = Tools::discover()?;
    let triple = selected_target(&tools);
    let metadata = cargo_metadata::MetadataCommand::new().no_deps().exec()?;
    let package = metadata.root_package().ok_or(ShipError::NoBinName)?;
    let bin_name = &package.name;

    // If the triple is a matrix entry, reuse its tag and archive kind so the
    // local tarball matches what a release run would have named it
    let matrix = targets::default_matrix();
    let entry = matrix.iter().find(|t| t.triple == triple);
    let (tag, kind) = entry
        .map(|t| (t.artifact_tag.clone(), t.archive))
        .unwrap_or_else(|| (triple.clone(), ArchiveKind::TarXz));
    let bin_file = entry
        .map(|t| t.bin_file_name(bin_name))
        .unwrap_or_else(|| bin_name.clone());

    let binary = metadata
        .target_directory
        .join(&triple)
        .join("release")
        .join(bin_file);
    let out_dir: Utf8PathBuf = metadata.target_directory.join("shipwright");
    let stage_dir = out_dir.join("stage").join(&tag);
    let archive_path = out_dir.join(format!("{bin_name}-{tag}.{}", kind.extension()));
    package::archive_binary(&binary, &stage_dir, &archive_path, kind)?;
    eprintln!("wrote {archive_path}");
    Ok(())
}

fn task_package_deb() -> ShipResult<()> {
    let tools = Tools::discover()?;
    let triple = selected_target(&tools);
    Cmd::new(&tools.cargo.cmd, "build a .deb package")
        .arg("deb")
        .arg("--target")
        .arg(&triple)
        .run()?;
    Ok(())
}

fn task_book(serve: bool) -> ShipResult<()> {
    let verb = if serve { "serve" } else { "build" };
    Cmd::new("mdbook", format!("{verb} the docs book"))
        .arg(verb)
        .arg("book")
        .run()?;
    Ok(())
}

/// The pre-publish gate
///
/// Checks, in order: working tree (warn-only), static analysis across the
/// feature combinations and code categories, and the full test suite.
fn task_validate() -> ShipResult<()> {
    let tools = Tools::discover()?;

    // Dirty-tree check is warn-only: it reports but does not block
    let status = Cmd::new("git", "check the working tree")
        .arg("status")
        .arg("--porcelain")
        .output()?;
    if !status.stdout.is_empty() {
        warn!("working tree has uncommitted changes");
    }

    for features in ["--no-default-features", "--all-features"] {
        Cmd::new(&tools.cargo.cmd, "run the lints")
            .arg("clippy")
            .arg("--workspace")
            .arg("--all-targets")
            .arg(features)
            .arg("--")
            .arg("-D")
            .arg("warnings")
            .run()
            .map_err(|cause| ShipError::Validation {
                check: format!("clippy {features}"),
                reason: cause.to_string(),
            })?;
    }

    Cmd::new(&tools.cargo.cmd, "run the test suite")
        .arg("test")
        .arg("--workspace")
        .arg("--all-features")
        .run()
        .map_err(|cause| ShipError::Validation {
            check: "tests".to_owned(),
            reason: cause.to_string(),
        })?;
    Ok(())
}

fn task_cargo_publish(dry_run: bool) -> ShipResult<()> {
    let tools = Tools::discover()?;
    let summary = if dry_run {
        "rehearse the registry publish"
    } else {
        "publish to the registry"
    };
    let mut cmd = Cmd::new(&tools.cargo.cmd, summary);
    cmd.arg("publish");
    if dry_run {
        cmd.arg("--dry-run");
    }
    cmd.run()?;
    Ok(())
}

fn task_tag() -> ShipResult<()> {
    let metadata = cargo_metadata::MetadataCommand::new().no_deps().exec()?;
    let package = metadata.root_package().ok_or(ShipError::NoBinName)?;
    let tag = format!("v{}", package.version);
    Cmd::new("git", format!("create the {tag} tag"))
        .arg("tag")
        .arg("-a")
        .arg(&tag)
        .arg("-m")
        .arg(&tag)
        .run()?;
    eprintln!("tagged {tag}");
    Ok(())
}
