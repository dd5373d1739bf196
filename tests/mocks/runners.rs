//! Scripted job runners and observers.

use quorumci::engine::orchestrator::ProgressObserver;
use quorumci::jobs::{ExecutionContext, JobRunner};
use quorumci::{ExecutionResult, ExecutionStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// Outcome a scripted runner returns for one processor
#[derive(Debug, Clone)]
pub struct ScriptedOutcome {
    pub status: ExecutionStatus,
    pub status_code: Option<i32>,
    pub hash: Option<String>,
    pub error: Option<String>,
}

impl ScriptedOutcome {
    pub fn success(hash: &str) -> Self {
        ScriptedOutcome {
            status: ExecutionStatus::Success,
            status_code: Some(200),
            hash: Some(hash.to_string()),
            error: None,
        }
    }

    pub fn failure(code: i32) -> Self {
        ScriptedOutcome {
            status: ExecutionStatus::Failure,
            status_code: Some(code),
            hash: None,
            error: Some(format!("Expected status 200, got {}", code)),
        }
    }

    pub fn timeout() -> Self {
        ScriptedOutcome {
            status: ExecutionStatus::Timeout,
            status_code: None,
            hash: None,
            error: Some("Request timed out".to_string()),
        }
    }

    fn to_result(&self, processor_id: &str) -> ExecutionResult {
        let mut result = ExecutionResult::new(processor_id, self.status, 5);
        result.status_code = self.status_code;
        result.response_hash = self.hash.clone();
        result.error = self.error.clone();
        result
    }
}

/// Returns a fixed outcome per processor id and records every call
pub struct ScriptedRunner {
    outcomes: HashMap<String, ScriptedOutcome>,
    fallback: ScriptedOutcome,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    /// Outcomes in attempt order: the first goes to local-1, and so on
    pub fn in_order(outcomes: Vec<ScriptedOutcome>) -> Self {
        let outcomes = outcomes
            .into_iter()
            .enumerate()
            .map(|(i, outcome)| (format!("local-{}", i + 1), outcome))
            .collect();
        ScriptedRunner {
            outcomes,
            fallback: ScriptedOutcome::timeout(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(outcome: ScriptedOutcome) -> Self {
        ScriptedRunner {
            outcomes: HashMap::new(),
            fallback: outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl JobRunner for ScriptedRunner {
    fn describe(&self) -> String {
        "scripted executions".to_string()
    }

    fn execute(&self, context: &ExecutionContext) -> ExecutionResult {
        self.calls.lock().unwrap().push(context.processor_id.clone());
        self.outcomes
            .get(&context.processor_id)
            .unwrap_or(&self.fallback)
            .to_result(&context.processor_id)
    }
}

/// Panics for the listed processors and succeeds for the rest
pub struct PanickingRunner {
    pub panic_on: Vec<String>,
}

impl JobRunner for PanickingRunner {
    fn describe(&self) -> String {
        "panicking executions".to_string()
    }

    fn execute(&self, context: &ExecutionContext) -> ExecutionResult {
        if self.panic_on.contains(&context.processor_id) {
            panic!("runner exploded on {}", context.processor_id);
        }
        ScriptedOutcome::success("steady").to_result(&context.processor_id)
    }
}

/// Sleeps before succeeding and tracks peak concurrency
pub struct SlowRunner {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowRunner {
    pub fn new(delay: Duration) -> Self {
        SlowRunner {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl JobRunner for SlowRunner {
    fn describe(&self) -> String {
        "slow executions".to_string()
    }

    fn execute(&self, context: &ExecutionContext) -> ExecutionResult {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        // Later attempts finish first, so completion order differs from attempt order
        let attempt: u64 = context
            .processor_id
            .trim_start_matches("local-")
            .parse()
            .unwrap_or(1);
        thread::sleep(self.delay / attempt as u32);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        ScriptedOutcome::success("slow").to_result(&context.processor_id)
    }
}

/// Records progress notifications
#[derive(Default)]
pub struct RecordingObserver {
    pub started: Mutex<Vec<(String, u32)>>,
    pub results: Mutex<Vec<(u32, ExecutionStatus)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn result_attempts(&self) -> Vec<u32> {
        let mut attempts: Vec<u32> = self.results.lock().unwrap().iter().map(|(a, _)| *a).collect();
        attempts.sort_unstable();
        attempts
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_start(&self, description: &str, executions: u32) {
        self.started
            .lock()
            .unwrap()
            .push((description.to_string(), executions));
    }

    fn on_result(&self, attempt: u32, result: &ExecutionResult) {
        self.results.lock().unwrap().push((attempt, result.status));
    }
}
