//! The `shipwright` binary

use clap::Parser;
use cli::{Cli, Commands, OutputFormat, PlanArgs, RunArgs};
use console::Term;
use miette::IntoDiagnostic;
use shipwright::config::{BuildMode, Config, ResolveArgs};
use shipwright::errors::ShipError;
use shipwright::runner;

mod cli;

fn main() {
    let config = Cli::parse();

    axocli::CliAppBuilder::new("shipwright")
        .verbose(config.verbose)
        .json_errors(config.output_format == OutputFormat::Json)
        .start(config, real_main);
}

fn real_main(app: &axocli::CliApp<Cli>) -> Result<(), miette::Report> {
    match &app.config.command {
        Commands::Run(args) => cmd_run(&app.config, args),
        Commands::Plan(args) => cmd_plan(&app.config, args),
        Commands::Task(args) => Ok(runner::run_task(args.task)?),
    }
}

fn cmd_run(cli: &Cli, args: &RunArgs) -> Result<(), miette::Report> {
    let build_mode = if args.fake_builds {
        BuildMode::Fake {
            fail: args.fake_fail.clone(),
        }
    } else {
        BuildMode::Cargo
    };
    let cfg = Config::resolve(ResolveArgs {
        tag: args.tag.clone(),
        only_targets: args.target.clone(),
        policy: args.failure_policy,
        build_mode,
    })?;

    let report = shipwright::do_run(&cfg)?;
    if cli.output_format == OutputFormat::Json {
        print_json(&report)?;
    }

    // The table already told the per-target story; the exit status still has
    // to be honest about the run as a whole
    if !report.is_complete() {
        Err(ShipError::RunIncomplete {
            tag: report.tag.clone(),
            outcome: report.outcome,
        })?;
    }
    Ok(())
}

fn cmd_plan(cli: &Cli, args: &PlanArgs) -> Result<(), miette::Report> {
    let cfg = Config::resolve(ResolveArgs {
        tag: args.tag.clone(),
        only_targets: args.target.clone(),
        policy: None,
        build_mode: BuildMode::Cargo,
    })?;

    let plan = shipwright::do_plan(&cfg)?;
    match cli.output_format {
        OutputFormat::Human => {
            eprintln!("steps for {}:", plan.tag);
            for step in &plan.steps {
                if step.needs.is_empty() {
                    eprintln!("  {}", step.id);
                } else {
                    eprintln!("  {} (needs: {})", step.id, step.needs.join(", "));
                }
            }
            eprintln!("assets:");
            for asset in &plan.assets {
                eprintln!("  {} ({})", asset.file_name, asset.content_type);
            }
        }
        OutputFormat::Json => print_json(&plan)?,
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), miette::Report> {
    use std::io::Write;
    let string = serde_json::to_string_pretty(value).into_diagnostic()?;
    writeln!(&mut Term::stdout(), "{string}").into_diagnostic()?;
    Ok(())
}
