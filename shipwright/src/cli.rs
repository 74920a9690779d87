//! All the clap stuff for parsing/documenting the cli

use clap::{
    builder::{PossibleValuesParser, TypedValueParser},
    Args, Parser, Subcommand, ValueEnum,
};
use shipwright::config::FailurePolicy;
use shipwright::runner::Task;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Clone, Debug)]
#[clap(version, about, long_about = None)]
#[clap(bin_name = "shipwright")]
/// Cut multi-target releases from one tag.
pub struct Cli {
    /// Subcommands
    #[clap(subcommand)]
    pub command: Commands,

    /// How verbose logging should be (log level)
    #[clap(long, short)]
    #[clap(default_value_t = LevelFilter::WARN)]
    #[clap(value_parser = PossibleValuesParser::new(["off", "error", "warn", "info", "debug", "trace"]).map(|s| s.parse::<LevelFilter>().expect("possible values are valid")))]
    #[clap(help_heading = "GLOBAL OPTIONS", global = true)]
    pub verbose: LevelFilter,

    /// The format of the output
    #[clap(long, short, value_enum)]
    #[clap(default_value_t = OutputFormat::Human)]
    #[clap(help_heading = "GLOBAL OPTIONS", global = true)]
    pub output_format: OutputFormat,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Build every target in the matrix, create the release, attach the assets
    ///
    /// This is what a tag push triggers. Builds and release-creation run
    /// concurrently; each target's packaging waits on exactly its own build
    /// plus the release record. The per-target outcome lands in
    /// run-report.json next to the archives.
    #[clap(disable_version_flag = true)]
    Run(RunArgs),
    /// Print the steps and assets a run would produce, without running it
    #[clap(disable_version_flag = true)]
    Plan(PlanArgs),
    /// Run one of the local developer tasks (and its prerequisites)
    ///
    /// Publish-class tasks (publish, dry-run, tag) sit behind the validate
    /// gate and refuse to run if it fails.
    #[clap(disable_version_flag = true)]
    Task(TaskArgs),
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// The pushed tag this run is releasing (e.g. v1.2.3)
    ///
    /// Also used to derive the release title and the version baked into
    /// asset filenames. If omitted we infer v{version} from the workspace's
    /// root package.
    #[clap(long)]
    pub tag: Option<String>,

    /// Restrict the run to these matrix target ids
    ///
    /// If left unspecified we run the whole matrix.
    #[clap(long, short)]
    pub target: Vec<String>,

    /// What a partial build failure does to the rest of the run
    ///
    /// If left unspecified we use failure-policy from shipwright.toml,
    /// defaulting to best-effort.
    #[clap(long, value_enum)]
    pub failure_policy: Option<FailurePolicy>,

    /// Emit placeholder binaries instead of invoking the toolchain
    ///
    /// Exercises the whole pipeline (graph, store, archives) without cross
    /// toolchains or a release host. Nothing gets uploaded.
    #[clap(long, hide = true)]
    pub fake_builds: bool,

    /// With --fake-builds: pretend these targets fail to compile
    #[clap(long, hide = true)]
    pub fake_fail: Vec<String>,
}

#[derive(Args, Clone, Debug)]
pub struct PlanArgs {
    /// The tag to plan for (defaults to v{version} of the root package)
    #[clap(long)]
    pub tag: Option<String>,

    /// Restrict the plan to these matrix target ids
    #[clap(long, short)]
    pub target: Vec<String>,
}

#[derive(Args, Clone, Debug)]
pub struct TaskArgs {
    /// Which task to run
    #[clap(value_enum)]
    pub task: Task,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}
