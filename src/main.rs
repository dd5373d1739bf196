//! quorumci CLI entry point
//!
//! Runs a check repeatedly and requires a quorum of executions to agree.

use anyhow::Context;
use clap::Parser;
use quorumci::cli::args::{Cli, Command, RunArgs, JOB_TYPE_HELP};
use quorumci::cli::output::{get_formatter, verdict_line};
use quorumci::engine::orchestrator::{LocalProvider, TracingObserver};
use quorumci::engine::result::QuorumResult;
use quorumci::inputs::normalize;
use quorumci::platform::actions::HostEnvironment;
use quorumci::version::get_build_info;
use quorumci::{run_job, QuorumError, RunConfig};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const EXIT_QUORUM_FAILED: u8 = 1;
const EXIT_CONFIGURATION: u8 = 2;
const EXIT_RUNTIME: u8 = 3;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Version => {
            println!("{}", get_build_info());
            ExitCode::SUCCESS
        }
        Command::List => {
            print_job_types();
            ExitCode::SUCCESS
        }
        Command::Run(args) => {
            init_tracing(args.quiet, args.verbose);
            let host = HostEnvironment::from_env();

            match run(&args, &host) {
                Ok(result) => {
                    let line = verdict_line(&result);
                    if result.is_pass() {
                        info!("{}", line);
                        ExitCode::SUCCESS
                    } else {
                        host.error(&line);
                        eprintln!("{}", line);
                        ExitCode::from(EXIT_QUORUM_FAILED)
                    }
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    host.error(&message);
                    eprintln!("Error: {}", message);

                    let configuration = e
                        .downcast_ref::<QuorumError>()
                        .map_or(false, QuorumError::is_configuration);
                    ExitCode::from(if configuration {
                        EXIT_CONFIGURATION
                    } else {
                        EXIT_RUNTIME
                    })
                }
            }
        }
    }
}

/// Initialize tracing on stderr so stdout carries only the report.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` enables debug and
/// `--quiet` limits output to warnings.
fn init_tracing(quiet: bool, verbose: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(args: &RunArgs, host: &HostEnvironment) -> anyhow::Result<QuorumResult> {
    let job = normalize(&args.inputs.to_raw_inputs())?;
    for warning in &job.warnings {
        host.warning(warning);
    }

    let config = RunConfig::from_args(args);
    let provider = LocalProvider::new(config.orchestrator(), Arc::new(TracingObserver));
    let result = run_job(&job, &provider).context("Quorum run failed")?;

    let formatter = get_formatter(args.format, args.no_color, args.verbose, args.quiet);
    println!("{}", formatter.format(&result, &job.job));

    host.publish(&result, &job.job)
        .context("Failed to publish results to the CI host")?;

    Ok(result)
}

fn print_job_types() {
    println!("Available job types:");
    println!();
    for (name, required, optional) in JOB_TYPE_HELP {
        println!("  {:<8} requires: {}", name, required);
        println!("  {:<8} optional: {}", "", optional);
    }
    println!();
    println!("Common inputs: executions (default 3), quorum (default 2), timeout-ms (default 30000)");
}
