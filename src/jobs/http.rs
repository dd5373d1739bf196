//! HTTP job runner.

use super::{elapsed_ms, hash_content, ExecutionContext, ExpectedStatus, HttpJobConfig, JobRunner};
use crate::engine::result::{ExecutionResult, ExecutionStatus};
use crate::platform::network::{self, HttpRequest, HttpResponse, NetworkError};
use std::time::Instant;
use tracing::debug;

pub struct HttpJobRunner {
    config: HttpJobConfig,
}

impl HttpJobRunner {
    pub fn new(config: HttpJobConfig) -> Self {
        HttpJobRunner { config }
    }
}

impl JobRunner for HttpJobRunner {
    fn describe(&self) -> String {
        format!("executions against {}", self.config.url)
    }

    fn execute(&self, context: &ExecutionContext) -> ExecutionResult {
        let start = Instant::now();
        let request = HttpRequest {
            method: self.config.method,
            url: &self.config.url,
            headers: self.config.headers.as_ref(),
            body: self.config.body.as_ref().map(|b| b.as_bytes().to_vec()),
            timeout_ms: self.config.timeout_ms,
        };

        let outcome = network::send_request(&request);
        judge_response(
            &context.processor_id,
            outcome,
            &self.config.expected_status,
            elapsed_ms(start),
        )
    }
}

/// Turn a transport outcome into an execution result.
///
/// The body is hashed whenever a response arrived, so that attempts which
/// failed the status check can still be told apart in reports.
pub(crate) fn judge_response(
    processor_id: &str,
    outcome: Result<HttpResponse, NetworkError>,
    expected: &ExpectedStatus,
    latency_ms: u64,
) -> ExecutionResult {
    match outcome {
        Ok(response) => {
            let code = i32::from(response.status_code);
            let hash = hash_content(&response.body);
            debug!(processor_id, status_code = code, latency_ms, "Received response");

            if expected.matches(code) {
                ExecutionResult::new(processor_id, ExecutionStatus::Success, latency_ms)
                    .with_status_code(code)
                    .with_hash(hash)
            } else {
                ExecutionResult::new(processor_id, ExecutionStatus::Failure, latency_ms)
                    .with_status_code(code)
                    .with_hash(hash)
                    .with_error(format!("Expected status {}, got {}", expected, code))
            }
        }
        Err(e) if e.is_timeout() => {
            ExecutionResult::new(processor_id, ExecutionStatus::Timeout, latency_ms)
                .with_error(e.to_string())
        }
        Err(e) => ExecutionResult::new(processor_id, ExecutionStatus::Error, latency_ms)
            .with_error(e.to_string()),
    }
}
