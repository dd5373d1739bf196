//! Quorum aggregation tests.
//!
//! Scenario tests for the consensus rules plus property tests over
//! arbitrary execution outcomes.

use proptest::prelude::*;
use quorumci::engine::result::{find_consensus, QuorumResult};
use quorumci::{ExecutionResult, ExecutionStatus, QuorumAggregator, QuorumConfig, Verdict};
use std::time::Instant;

fn success(id: &str, hash: &str) -> ExecutionResult {
    ExecutionResult::new(id, ExecutionStatus::Success, 10)
        .with_status_code(200)
        .with_hash(hash)
}

fn evaluate(results: Vec<ExecutionResult>, executions: u32, required: u32) -> QuorumResult {
    let config = QuorumConfig::new(executions, required).unwrap();
    QuorumAggregator::new()
        .aggregate(results, &config, "job-under-test", Instant::now())
        .unwrap()
}

#[test]
fn test_unanimous_success() {
    let result = evaluate(
        vec![success("local-1", "h1"), success("local-2", "h1"), success("local-3", "h1")],
        3,
        2,
    );

    assert_eq!(result.verdict, Verdict::Pass);
    assert_eq!(result.agreement_count, 3);
    assert_eq!(result.consensus_hash.as_deref(), Some("h1"));
    assert_eq!(result.total_executions, 3);
    assert_eq!(result.job_id, "job-under-test");
}

#[test]
fn test_split_content_fails_strict_quorum() {
    let result = evaluate(
        vec![success("local-1", "h1"), success("local-2", "h2"), success("local-3", "h1")],
        3,
        3,
    );

    assert_eq!(result.verdict, Verdict::Fail);
    assert!(!result.quorum_met);
    assert_eq!(result.agreement_count, 2);
    assert_eq!(result.required_agreement, 3);
    assert_eq!(result.consensus_hash.as_deref(), Some("h1"));
}

#[test]
fn test_failures_never_form_consensus() {
    let failure = |id: &str| {
        ExecutionResult::new(id, ExecutionStatus::Failure, 10)
            .with_status_code(500)
            .with_hash("same-error-page")
    };
    let result = evaluate(vec![failure("local-1"), failure("local-2"), failure("local-3")], 3, 1);

    assert_eq!(result.verdict, Verdict::Fail);
    assert_eq!(result.agreement_count, 0);
    assert!(result.consensus_hash.is_none());
}

#[test]
fn test_timeouts_are_reported_but_not_counted() {
    let result = evaluate(
        vec![
            success("local-1", "h1"),
            ExecutionResult::new("local-2", ExecutionStatus::Timeout, 30_000)
                .with_error("Request timed out after 30000ms"),
            success("local-3", "h1"),
        ],
        3,
        2,
    );

    assert!(result.is_pass());
    let summary = result.summary();
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.timed_out, 1);
    assert_eq!(summary.total_latency_ms, 30_020);
}

#[test]
fn test_status_code_groups_without_hashes() {
    let plain = |id: &str, code: i32| ExecutionResult::new(id, ExecutionStatus::Success, 10).with_status_code(code);
    let result = evaluate(
        vec![plain("local-1", 204), plain("local-2", 200), plain("local-3", 204)],
        3,
        2,
    );

    assert!(result.is_pass());
    assert_eq!(result.agreement_count, 2);
    assert!(result.consensus_hash.is_none());
}

#[test]
fn test_hash_group_and_code_group_are_distinct() {
    let result = evaluate(
        vec![
            success("local-1", "h1"),
            ExecutionResult::new("local-2", ExecutionStatus::Success, 10).with_status_code(200),
        ],
        2,
        2,
    );

    assert_eq!(result.agreement_count, 1);
    assert_eq!(result.verdict, Verdict::Fail);
}

#[test]
fn test_tie_prefers_earliest_group() {
    let results = vec![
        success("local-1", "late-bloomer"),
        success("local-2", "other"),
        success("local-3", "other"),
        success("local-4", "late-bloomer"),
    ];

    let group = find_consensus(&results).unwrap();
    assert_eq!(group.size, 2);
    assert_eq!(group.hash.as_deref(), Some("late-bloomer"));
    assert_eq!(group.first_index, 0);
}

#[test]
fn test_empty_results_are_an_error() {
    let config = QuorumConfig::new(3, 2).unwrap();
    let err = QuorumAggregator::new()
        .aggregate(Vec::new(), &config, "job", Instant::now())
        .unwrap_err();
    assert!(err.to_string().contains("expected 3"));
}

#[test]
fn test_result_json_shape() {
    let failed = evaluate(
        vec![ExecutionResult::new("local-1", ExecutionStatus::Error, 3).with_error("connection refused")],
        1,
        1,
    );

    let json = serde_json::to_value(&failed).unwrap();
    assert_eq!(json["verdict"], "fail");
    assert_eq!(json["quorumMet"], false);
    assert_eq!(json["requiredAgreement"], 1);
    assert!(json.get("consensusHash").is_none());
    assert_eq!(json["executions"][0]["processorId"], "local-1");
    assert_eq!(json["executions"][0]["status"], "error");

    let back: QuorumResult = serde_json::from_value(json).unwrap();
    assert_eq!(back, failed);
}

fn outcome() -> impl Strategy<Value = (ExecutionStatus, Option<u8>)> {
    (
        prop_oneof![
            3 => Just(ExecutionStatus::Success),
            1 => Just(ExecutionStatus::Failure),
            1 => Just(ExecutionStatus::Timeout),
            1 => Just(ExecutionStatus::Error),
        ],
        proptest::option::of(0u8..4),
    )
}

fn build(outcomes: &[(ExecutionStatus, Option<u8>)]) -> Vec<ExecutionResult> {
    outcomes
        .iter()
        .enumerate()
        .map(|(i, (status, hash))| {
            let mut result = ExecutionResult::new(format!("local-{}", i + 1), *status, 1).with_status_code(200);
            if let Some(h) = hash {
                result = result.with_hash(format!("hash-{}", h));
            }
            result
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_agreement_is_order_independent(
        (original, shuffled) in proptest::collection::vec(outcome(), 1..12)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let n = original.len() as u32;
        let a = evaluate(build(&original), n, 1);
        let b = evaluate(build(&shuffled), n, 1);
        prop_assert_eq!(a.agreement_count, b.agreement_count);
        prop_assert_eq!(a.verdict, b.verdict);
    }

    #[test]
    fn prop_agreement_bounded_by_successes(outcomes in proptest::collection::vec(outcome(), 1..12), required in 1u32..12) {
        let n = outcomes.len() as u32;
        let required = required.min(n);
        let result = evaluate(build(&outcomes), n, required);
        let successes = result.summary().succeeded;

        prop_assert!(result.agreement_count <= successes);
        prop_assert_eq!(successes > 0, result.agreement_count > 0);
        prop_assert_eq!(result.is_pass(), result.agreement_count >= required);
        prop_assert_eq!(result.quorum_met, result.is_pass());
    }

    #[test]
    fn prop_identical_successes_always_pass(n in 1u32..10, required in 1u32..10) {
        let required = required.min(n);
        let results = (1..=n).map(|i| success(&format!("local-{}", i), "same")).collect();
        let result = evaluate(results, n, required);
        prop_assert!(result.is_pass());
        prop_assert_eq!(result.agreement_count, n);
    }
}
