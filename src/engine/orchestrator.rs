//! Execution orchestrator.
//!
//! Drives a job runner the configured number of times and hands the results
//! to the aggregator.
//!
//! # Graceful Degradation
//!
//! This module handles errors gracefully:
//! - Runner panics: Caught via std::panic::catch_unwind, converted to an Error result
//! - Failing or timed out attempts: Recorded, remaining attempts still run
//! - Zero executions: Rejected earlier by QuorumConfig, never reached here
//!
//! Results always come back in attempt order, in both sequential and
//! parallel mode.

use crate::engine::result::{ExecutionResult, ExecutionStatus, QuorumAggregator, QuorumConfig, QuorumResult};
use crate::jobs::{ExecutionContext, JobConfig, JobRunner};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub parallel: bool,
    pub max_parallel: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            parallel: false,
            max_parallel: 4,
        }
    }
}

/// Receives progress notifications while attempts run
pub trait ProgressObserver: Send + Sync {
    fn on_start(&self, description: &str, executions: u32);
    fn on_result(&self, attempt: u32, result: &ExecutionResult);
}

/// Reports progress through tracing
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_start(&self, description: &str, executions: u32) {
        info!("Running {} {}...", executions, description);
    }

    fn on_result(&self, attempt: u32, result: &ExecutionResult) {
        info!(
            processor_id = %result.processor_id,
            latency_ms = result.latency_ms,
            "  Execution {}: {}",
            attempt,
            result.status
        );
    }
}

/// Discards progress
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_start(&self, _description: &str, _executions: u32) {}
    fn on_result(&self, _attempt: u32, _result: &ExecutionResult) {}
}

/// Processor id for a 1-based attempt number
pub fn processor_id(attempt: u32) -> String {
    format!("local-{}", attempt)
}

/// Runs the attempts of one job
pub struct ExecutionOrchestrator {
    config: OrchestratorConfig,
    observer: Arc<dyn ProgressObserver>,
}

impl ExecutionOrchestrator {
    pub fn new(config: OrchestratorConfig, observer: Arc<dyn ProgressObserver>) -> Self {
        ExecutionOrchestrator { config, observer }
    }

    /// Run `executions` attempts of `runner`, returning results in attempt order
    pub fn run(&self, runner: &dyn JobRunner, executions: u32) -> Vec<ExecutionResult> {
        self.observer.on_start(&runner.describe(), executions);

        if self.config.parallel && executions > 1 {
            self.run_parallel(runner, executions)
        } else {
            self.run_sequential(runner, executions)
        }
    }

    fn run_sequential(&self, runner: &dyn JobRunner, executions: u32) -> Vec<ExecutionResult> {
        (1..=executions)
            .map(|attempt| {
                let result = execute_attempt(runner, attempt);
                self.observer.on_result(attempt, &result);
                result
            })
            .collect()
    }

    /// Run attempts in batches of at most `max_parallel` on scoped threads
    fn run_parallel(&self, runner: &dyn JobRunner, executions: u32) -> Vec<ExecutionResult> {
        let batch_size = self.config.max_parallel.max(1);
        let attempts: Vec<u32> = (1..=executions).collect();
        let mut results: Vec<Option<ExecutionResult>> = vec![None; attempts.len()];

        debug!(executions, batch_size, "Running attempts in parallel");

        for batch in attempts.chunks(batch_size) {
            let finished: Vec<(u32, ExecutionResult)> = thread::scope(|s| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|&attempt| s.spawn(move || (attempt, execute_attempt(runner, attempt))))
                    .collect();

                handles
                    .into_iter()
                    .zip(batch)
                    .map(|(handle, &attempt)| {
                        // execute_attempt already contains runner panics
                        handle
                            .join()
                            .unwrap_or_else(|_| (attempt, panicked_result(attempt, 0)))
                    })
                    .collect()
            });

            for (attempt, result) in finished {
                self.observer.on_result(attempt, &result);
                results[(attempt - 1) as usize] = Some(result);
            }
        }

        results
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.unwrap_or_else(|| panicked_result(i as u32 + 1, 0)))
            .collect()
    }
}

/// Run one attempt, containing any panic in the runner
fn execute_attempt(runner: &dyn JobRunner, attempt: u32) -> ExecutionResult {
    let context = ExecutionContext::new(processor_id(attempt));
    let start = Instant::now();

    match panic::catch_unwind(AssertUnwindSafe(|| runner.execute(&context))) {
        Ok(result) => result,
        Err(_) => {
            let elapsed = start.elapsed().as_millis() as u64;
            warn!(processor_id = %context.processor_id, "Runner panicked");
            panicked_result(attempt, elapsed)
        }
    }
}

fn panicked_result(attempt: u32, latency_ms: u64) -> ExecutionResult {
    ExecutionResult::new(processor_id(attempt), ExecutionStatus::Error, latency_ms)
        .with_error("Runner panicked during execution")
}

/// A job as handed to an execution provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescription {
    pub id: String,
    pub config: JobConfig,
    pub quorum: QuorumConfig,
    pub created_at: DateTime<Utc>,
}

impl JobDescription {
    /// Describe a job under a freshly minted id
    pub fn new(config: JobConfig, quorum: QuorumConfig) -> Self {
        JobDescription {
            id: Uuid::new_v4().to_string(),
            config,
            quorum,
            created_at: Utc::now(),
        }
    }
}

/// Runs a job's executions and reduces them to a quorum result.
///
/// The local provider runs every attempt in this process; other providers
/// may fan attempts out to remote processors as long as they return the
/// same result shape.
pub trait ExecutionProvider {
    fn execute(&self, job: &JobDescription) -> Result<QuorumResult>;
}

/// Executes jobs on the local machine
pub struct LocalProvider {
    orchestrator: ExecutionOrchestrator,
    aggregator: QuorumAggregator,
}

impl LocalProvider {
    pub fn new(config: OrchestratorConfig, observer: Arc<dyn ProgressObserver>) -> Self {
        LocalProvider {
            orchestrator: ExecutionOrchestrator::new(config, observer),
            aggregator: QuorumAggregator::new(),
        }
    }

    /// Execute `job` with an explicit runner instead of the one its config builds
    pub fn run_with_runner(&self, job: &JobDescription, runner: &dyn JobRunner) -> Result<QuorumResult> {
        let started = Instant::now();
        let results = self.orchestrator.run(runner, job.quorum.executions);
        let result = self.aggregator.aggregate(results, &job.quorum, &job.id, started)?;

        info!(
            job_id = %result.job_id,
            verdict = %result.verdict,
            agreement = result.agreement_count,
            duration_ms = result.duration_ms,
            "Quorum evaluated"
        );
        Ok(result)
    }
}

impl ExecutionProvider for LocalProvider {
    fn execute(&self, job: &JobDescription) -> Result<QuorumResult> {
        let runner = job.config.runner();
        self.run_with_runner(job, runner.as_ref())
    }
}
