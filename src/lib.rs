//! quorumci library
//!
//! Verifies that an external check (HTTP call, webhook, script, DNS lookup,
//! TLS certificate probe) behaves consistently when repeated, and renders a
//! verdict based on whether enough executions agree on what they observed.
//!
//! This library provides:
//! - Normalization of flat string inputs into a typed job configuration
//! - One runner per job type, each producing a normalized execution result
//! - Orchestration of N executions, sequentially or on parallel processors
//! - Quorum aggregation based on content agreement between executions
//! - Terminal, JSON and Markdown reporting plus CI host outputs
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use quorumci::engine::orchestrator::{LocalProvider, OrchestratorConfig, TracingObserver};
//! use quorumci::inputs::{normalize, RawInputs};
//! use quorumci::run_job;
//!
//! let raw = RawInputs::new()
//!     .with("type", "http")
//!     .with("url", "https://example.com/health")
//!     .with("method", "GET")
//!     .with("executions", "3")
//!     .with("quorum", "2")
//!     .with("timeout-ms", "5000");
//!
//! let job = normalize(&raw).expect("invalid inputs");
//! let provider = LocalProvider::new(OrchestratorConfig::default(), Arc::new(TracingObserver));
//! let result = run_job(&job, &provider).expect("run failed");
//! println!("{}: {}/{} agreed", result.verdict, result.agreement_count, result.total_executions);
//! ```

pub mod cli;
pub mod engine;
pub mod inputs;
pub mod jobs;
pub mod platform;
pub mod version;

use cli::args::RunArgs;
use engine::orchestrator::{ExecutionProvider, JobDescription, OrchestratorConfig};
use engine::result::QuorumResult;
use inputs::NormalizedJob;
use thiserror::Error;
use tracing::info;

// Re-exports for public API
pub use engine::orchestrator::LocalProvider;
pub use engine::result::{ExecutionResult, ExecutionStatus, QuorumAggregator, QuorumConfig, Verdict};
pub use jobs::{JobConfig, JobRunner};

/// Error types for quorumci operations.
///
/// Only configuration problems and programmer errors are represented here.
/// Failures of the checks themselves are recorded as `ExecutionResult`s.
#[derive(Error, Debug)]
pub enum QuorumError {
    /// Invalid or missing input, raised before any execution begins
    #[error("{0}")]
    Validation(String),

    /// The script file could not be read
    #[error("Failed to read script-file {path}: {source}")]
    ScriptFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Aggregation was asked to fold an empty result list
    #[error("No execution results to aggregate (expected {expected})")]
    NoResults { expected: u32 },

    /// An execution provider failed to produce a result
    #[error("Execution provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for quorumci operations
pub type Result<T> = std::result::Result<T, QuorumError>;

impl QuorumError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether this error was raised while validating configuration
    pub fn is_configuration(&self) -> bool {
        matches!(self, QuorumError::Validation(_) | QuorumError::ScriptFile { .. })
    }
}

/// Configuration for running a job.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Run executions on parallel processors
    pub parallel: bool,
    /// Maximum executions in flight when parallel
    pub max_parallel: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            parallel: false,
            max_parallel: 4,
        }
    }
}

impl RunConfig {
    /// Create configuration from command line arguments
    pub fn from_args(args: &RunArgs) -> Self {
        RunConfig {
            parallel: args.parallel,
            max_parallel: args.max_parallel,
        }
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            parallel: self.parallel,
            max_parallel: self.max_parallel,
        }
    }
}

/// Run a normalized job through an execution provider.
///
/// Mints a fresh job id and hands the job description to `provider`, which
/// either orchestrates the executions locally or delegates them.
pub fn run_job(job: &NormalizedJob, provider: &dyn ExecutionProvider) -> Result<QuorumResult> {
    let description = JobDescription::new(job.job.clone(), job.quorum);

    info!(
        job_id = %description.id,
        job_type = %job.job.kind(),
        executions = job.quorum.executions,
        required = job.quorum.required,
        "Starting quorum job"
    );

    provider.execute(&description)
}
