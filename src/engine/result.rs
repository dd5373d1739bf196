//! Execution results and quorum aggregation.
//!
//! Collects per-attempt outcomes, groups successful executions by the content
//! they observed, and folds the groups into a single pass/fail verdict.

use crate::{QuorumError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Outcome of a single execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// The check behaved as expected
    Success,
    /// The check completed but did not meet its success criteria
    Failure,
    /// The attempt hit its deadline
    Timeout,
    /// The check could not be carried out (network, spawn, handshake error)
    Error,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Failure => write!(f, "failure"),
            ExecutionStatus::Timeout => write!(f, "timeout"),
            ExecutionStatus::Error => write!(f, "error"),
        }
    }
}

/// Result of one execution attempt on one processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Processor that ran the attempt (e.g., "local-1")
    pub processor_id: String,
    pub status: ExecutionStatus,
    /// HTTP status code or process exit code, when one was observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i32>,
    /// Wall-clock time spent on the operation itself
    pub latency_ms: u64,
    /// Hex SHA-256 of the normalized response content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn new(processor_id: impl Into<String>, status: ExecutionStatus, latency_ms: u64) -> Self {
        ExecutionResult {
            processor_id: processor_id.into(),
            status,
            status_code: None,
            latency_ms,
            response_hash: None,
            error: None,
        }
    }

    pub fn with_status_code(mut self, code: i32) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.response_hash = Some(hash.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// How many executions to run and how many must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuorumConfig {
    pub executions: u32,
    pub required: u32,
}

impl QuorumConfig {
    /// Create a quorum configuration, enforcing `1 <= required <= executions`.
    pub fn new(executions: u32, required: u32) -> Result<Self> {
        if executions < 1 {
            return Err(QuorumError::validation("executions must be a positive number"));
        }
        if required < 1 {
            return Err(QuorumError::validation("quorum must be a positive number"));
        }
        if required > executions {
            return Err(QuorumError::validation(format!(
                "quorum ({}) cannot be greater than executions ({})",
                required, executions
            )));
        }
        Ok(QuorumConfig {
            executions,
            required,
        })
    }
}

/// Final verdict of a quorum run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "pass"),
            Verdict::Fail => write!(f, "fail"),
        }
    }
}

/// Verdict for one job, derived from all of its executions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuorumResult {
    pub job_id: String,
    pub verdict: Verdict,
    pub quorum_met: bool,
    pub agreement_count: u32,
    pub required_agreement: u32,
    pub total_executions: u32,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_hash: Option<String>,
    pub executions: Vec<ExecutionResult>,
}

impl QuorumResult {
    pub fn is_pass(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    /// Count executions by status
    pub fn summary(&self) -> ExecutionSummary {
        let mut summary = ExecutionSummary::default();

        for execution in &self.executions {
            summary.total += 1;
            summary.total_latency_ms += execution.latency_ms;

            match execution.status {
                ExecutionStatus::Success => summary.succeeded += 1,
                ExecutionStatus::Failure => summary.failed += 1,
                ExecutionStatus::Timeout => summary.timed_out += 1,
                ExecutionStatus::Error => summary.errored += 1,
            }
        }

        summary
    }
}

/// Per-status execution counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub succeeded: u32,
    pub failed: u32,
    pub timed_out: u32,
    pub errored: u32,
    pub total: u32,
    pub total_latency_ms: u64,
}

/// Key under which successful executions are considered to agree.
///
/// Results carrying a content hash agree on that hash. Results without one
/// fall back to their observed outcome, which never equals a hash key.
#[derive(Debug, Clone, PartialEq, Eq)]
enum GroupKey<'a> {
    Hash(&'a str),
    Outcome(ExecutionStatus, Option<i32>),
}

impl<'a> GroupKey<'a> {
    fn of(result: &'a ExecutionResult) -> Self {
        match result.response_hash.as_deref() {
            Some(hash) => GroupKey::Hash(hash),
            None => GroupKey::Outcome(result.status, result.status_code),
        }
    }
}

/// The largest set of successful executions that agree with each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusGroup {
    /// Number of executions in the group
    pub size: u32,
    /// Shared response hash, if the group is hash-keyed
    pub hash: Option<String>,
    /// Attempt index of the group's first member
    pub first_index: usize,
}

/// Find the consensus group among successful executions.
///
/// Groups are ranked by size. Among equally sized groups the one whose first
/// member occurs earliest in execution order wins. Returns `None` when no
/// execution succeeded.
pub fn find_consensus(results: &[ExecutionResult]) -> Option<ConsensusGroup> {
    let mut groups: Vec<(GroupKey<'_>, u32, usize)> = Vec::new();

    for (index, result) in results.iter().enumerate() {
        if !result.is_success() {
            continue;
        }

        let key = GroupKey::of(result);
        match groups.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, size, _)) => *size += 1,
            None => groups.push((key, 1, index)),
        }
    }

    // Groups are in first-occurrence order, so a strict comparison keeps
    // the earliest group on ties.
    let mut best: Option<(GroupKey<'_>, u32, usize)> = None;
    for group in groups {
        if best.as_ref().map_or(true, |(_, size, _)| group.1 > *size) {
            best = Some(group);
        }
    }

    best.map(|(key, size, first_index)| ConsensusGroup {
        size,
        hash: match key {
            GroupKey::Hash(hash) => Some(hash.to_string()),
            GroupKey::Outcome(..) => None,
        },
        first_index,
    })
}

/// Reduces a job's execution results into a `QuorumResult`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuorumAggregator;

impl QuorumAggregator {
    pub fn new() -> Self {
        QuorumAggregator
    }

    /// Aggregate execution results into a verdict.
    ///
    /// The verdict only depends on `results` and `config`; `started` marks
    /// the beginning of orchestration and is used for `duration_ms`.
    ///
    /// # Errors
    ///
    /// Returns `QuorumError::NoResults` when `results` is empty.
    pub fn aggregate(
        &self,
        results: Vec<ExecutionResult>,
        config: &QuorumConfig,
        job_id: &str,
        started: Instant,
    ) -> Result<QuorumResult> {
        if results.is_empty() {
            return Err(QuorumError::NoResults {
                expected: config.executions,
            });
        }

        let consensus = find_consensus(&results);
        let agreement_count = consensus.as_ref().map_or(0, |c| c.size);
        let consensus_hash = consensus.and_then(|c| c.hash);
        let quorum_met = agreement_count >= config.required;

        Ok(QuorumResult {
            job_id: job_id.to_string(),
            verdict: if quorum_met { Verdict::Pass } else { Verdict::Fail },
            quorum_met,
            agreement_count,
            required_agreement: config.required,
            total_executions: results.len() as u32,
            duration_ms: started.elapsed().as_millis() as u64,
            consensus_hash,
            executions: results,
        })
    }
}
