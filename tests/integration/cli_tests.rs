//! CLI integration tests.
//!
//! Parses command lines and feeds the collected inputs through
//! normalization, as the binary does before running a job.

use clap::Parser;
use quorumci::cli::args::{Cli, Command, OutputFormat, RunArgs};
use quorumci::inputs::normalize;
use quorumci::jobs::{DnsRecordType, ExpectedStatus, JobConfig, JobKind};
use quorumci::RunConfig;

fn run_args(args: &[&str]) -> RunArgs {
    match Cli::try_parse_from(args).unwrap().into_command() {
        Command::Run(run) => run,
        other => panic!("expected run command, got {:?}", other),
    }
}

#[test]
fn test_http_command_line_normalizes() {
    let args = run_args(&[
        "quorumci",
        "run",
        "--type",
        "http",
        "--url",
        "https://status.example.com",
        "--expected-status",
        "200,204",
        "--executions",
        "5",
        "--quorum",
        "4",
    ]);

    let job = normalize(&args.inputs.to_raw_inputs()).unwrap();
    assert_eq!(job.quorum.executions, 5);
    assert_eq!(job.quorum.required, 4);
    match job.job {
        JobConfig::Http(http) => {
            assert_eq!(http.expected_status, ExpectedStatus::AnyOf(vec![200, 204]));
            assert_eq!(http.timeout_ms, 30_000);
        }
        other => panic!("expected http job, got {:?}", other),
    }
}

#[test]
fn test_dns_command_line_normalizes() {
    let args = run_args(&[
        "quorumci",
        "--type",
        "dns",
        "--hostname",
        "example.com",
        "--record-type",
        "mx",
        "--expected-values",
        "mail.example.com, backup.example.com",
    ]);

    let job = normalize(&args.inputs.to_raw_inputs()).unwrap();
    assert_eq!(job.job.kind(), JobKind::Dns);
    match job.job {
        JobConfig::Dns(dns) => {
            assert_eq!(dns.record_type, DnsRecordType::Mx);
            assert_eq!(dns.expected_values.unwrap().len(), 2);
        }
        other => panic!("expected dns job, got {:?}", other),
    }
}

#[test]
fn test_invalid_inputs_reach_validation() {
    let args = run_args(&["quorumci", "run", "--type", "ftp"]);
    let err = normalize(&args.inputs.to_raw_inputs()).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().starts_with("Invalid type: ftp"));

    let args = run_args(&["quorumci", "run", "--type", "http", "--url", "https://x", "--quorum", "0"]);
    let err = normalize(&args.inputs.to_raw_inputs()).unwrap_err();
    assert_eq!(err.to_string(), "quorum must be a positive number");
}

#[test]
fn test_run_config_from_args() {
    let args = run_args(&[
        "quorumci",
        "run",
        "--type",
        "tls",
        "--hostname",
        "example.com",
        "--parallel",
        "--max-parallel",
        "2",
        "--format",
        "json",
    ]);

    assert_eq!(args.format, OutputFormat::Json);
    let config = RunConfig::from_args(&args).orchestrator();
    assert!(config.parallel);
    assert_eq!(config.max_parallel, 2);
}

#[test]
fn test_unknown_flag_is_rejected() {
    assert!(Cli::try_parse_from(["quorumci", "run", "--retries", "3"]).is_err());
}

#[test]
fn test_conventional_env_flag_values() {
    // Only this test touches these variables
    std::env::set_var("NO_COLOR", "1");
    std::env::set_var("INPUT_PARALLEL", "off");
    let args = run_args(&["quorumci", "run", "--type", "dns", "--hostname", "example.com"]);
    assert!(args.no_color);
    assert!(!args.parallel);

    std::env::set_var("NO_COLOR", "0");
    std::env::set_var("INPUT_PARALLEL", "yes");
    let args = run_args(&["quorumci", "run", "--type", "dns", "--hostname", "example.com"]);
    assert!(!args.no_color);
    assert!(args.parallel);

    std::env::remove_var("NO_COLOR");
    std::env::remove_var("INPUT_PARALLEL");
}
