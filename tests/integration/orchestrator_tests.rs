//! Orchestration and provider tests.
//!
//! Runs scripted runners through the orchestrator and the local provider,
//! in sequential and parallel modes.

use crate::mocks::{PanickingRunner, RecordingObserver, ScriptedOutcome, ScriptedRunner, SlowRunner};
use quorumci::engine::orchestrator::{
    ExecutionOrchestrator, ExecutionProvider, JobDescription, LocalProvider, NoopObserver, OrchestratorConfig,
};
use quorumci::engine::result::QuorumResult;
use quorumci::inputs::NormalizedJob;
use quorumci::jobs::{ExpectedStatus, HttpJobConfig, HttpMethod, JobConfig};
use quorumci::{run_job, ExecutionStatus, QuorumConfig, Verdict};
use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

fn sequential() -> OrchestratorConfig {
    OrchestratorConfig {
        parallel: false,
        max_parallel: 4,
    }
}

fn parallel(max_parallel: usize) -> OrchestratorConfig {
    OrchestratorConfig {
        parallel: true,
        max_parallel,
    }
}

fn http_job() -> JobConfig {
    JobConfig::Http(HttpJobConfig {
        url: "http://127.0.0.1:9/unused".to_string(),
        method: HttpMethod::Get,
        headers: None,
        body: None,
        expected_status: ExpectedStatus::default(),
        timeout_ms: 1000,
    })
}

#[test]
fn test_sequential_runs_in_attempt_order() {
    let runner = ScriptedRunner::always(ScriptedOutcome::success("h"));
    let orchestrator = ExecutionOrchestrator::new(sequential(), Arc::new(NoopObserver));

    let results = orchestrator.run(&runner, 4);

    assert_eq!(runner.calls(), vec!["local-1", "local-2", "local-3", "local-4"]);
    let ids: Vec<&str> = results.iter().map(|r| r.processor_id.as_str()).collect();
    assert_eq!(ids, vec!["local-1", "local-2", "local-3", "local-4"]);
}

#[test]
fn test_parallel_results_keep_attempt_order() {
    let runner = SlowRunner::new(Duration::from_millis(120));
    let observer = Arc::new(RecordingObserver::new());
    let orchestrator = ExecutionOrchestrator::new(parallel(3), observer.clone());

    let results = orchestrator.run(&runner, 6);

    let ids: Vec<String> = results.iter().map(|r| r.processor_id.clone()).collect();
    let expected: Vec<String> = (1..=6).map(|i| format!("local-{}", i)).collect();
    assert_eq!(ids, expected);
    assert!(runner.peak_concurrency() <= 3);
    assert!(runner.peak_concurrency() >= 2);
    assert_eq!(observer.result_attempts(), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_observer_sees_start_and_every_result() {
    let runner = ScriptedRunner::in_order(vec![
        ScriptedOutcome::success("h"),
        ScriptedOutcome::failure(503),
    ]);
    let observer = Arc::new(RecordingObserver::new());
    let orchestrator = ExecutionOrchestrator::new(sequential(), observer.clone());

    orchestrator.run(&runner, 3);

    assert_eq!(
        *observer.started.lock().unwrap(),
        vec![("scripted executions".to_string(), 3)]
    );
    assert_eq!(
        *observer.results.lock().unwrap(),
        vec![
            (1, ExecutionStatus::Success),
            (2, ExecutionStatus::Failure),
            (3, ExecutionStatus::Timeout),
        ]
    );
}

#[test]
fn test_panicking_attempt_becomes_error_result() {
    let runner = PanickingRunner {
        panic_on: vec!["local-2".to_string()],
    };

    for config in [sequential(), parallel(2)] {
        let results = ExecutionOrchestrator::new(config, Arc::new(NoopObserver)).run(&runner, 3);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, ExecutionStatus::Success);
        assert_eq!(results[1].status, ExecutionStatus::Error);
        assert_eq!(results[1].processor_id, "local-2");
        assert!(results[1].error.as_deref().unwrap().contains("panicked"));
        assert_eq!(results[2].status, ExecutionStatus::Success);
    }
}

#[test]
fn test_local_provider_aggregates_runner_results() {
    let runner = ScriptedRunner::in_order(vec![
        ScriptedOutcome::success("body-a"),
        ScriptedOutcome::success("body-b"),
        ScriptedOutcome::success("body-a"),
    ]);
    let provider = LocalProvider::new(sequential(), Arc::new(NoopObserver));
    let job = JobDescription::new(http_job(), QuorumConfig::new(3, 2).unwrap());

    let result = provider.run_with_runner(&job, &runner).unwrap();

    assert_eq!(result.job_id, job.id);
    assert_eq!(result.verdict, Verdict::Pass);
    assert_eq!(result.agreement_count, 2);
    assert_eq!(result.consensus_hash.as_deref(), Some("body-a"));
    assert_eq!(result.executions.len(), 3);
}

#[test]
fn test_job_descriptions_get_unique_ids() {
    let quorum = QuorumConfig::new(1, 1).unwrap();
    let a = JobDescription::new(http_job(), quorum);
    let b = JobDescription::new(http_job(), quorum);
    assert_ne!(a.id, b.id);
}

/// Provider that records the job it was handed and answers from a runner
struct CapturingProvider {
    seen: RefCell<Option<JobDescription>>,
    inner: LocalProvider,
    runner: ScriptedRunner,
}

impl ExecutionProvider for CapturingProvider {
    fn execute(&self, job: &JobDescription) -> quorumci::Result<QuorumResult> {
        *self.seen.borrow_mut() = Some(job.clone());
        self.inner.run_with_runner(job, &self.runner)
    }
}

#[test]
fn test_run_job_hands_description_to_provider() {
    let provider = CapturingProvider {
        seen: RefCell::new(None),
        inner: LocalProvider::new(parallel(4), Arc::new(NoopObserver)),
        runner: ScriptedRunner::always(ScriptedOutcome::timeout()),
    };
    let job = NormalizedJob {
        job: http_job(),
        quorum: QuorumConfig::new(2, 1).unwrap(),
        warnings: Vec::new(),
    };

    let result = run_job(&job, &provider).unwrap();

    let seen = provider.seen.borrow().clone().unwrap();
    assert_eq!(seen.config, job.job);
    assert_eq!(seen.quorum, job.quorum);
    assert_eq!(seen.id, result.job_id);
    assert_eq!(result.verdict, Verdict::Fail);
    assert_eq!(result.summary().timed_out, 2);
}
