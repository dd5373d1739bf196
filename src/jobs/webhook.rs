//! Webhook job runner.
//!
//! A webhook attempt is a POST of the JSON payload; the response is judged
//! exactly like an HTTP job.

use super::http::judge_response;
use super::{elapsed_ms, ExecutionContext, HttpMethod, JobRunner, WebhookJobConfig};
use crate::engine::result::{ExecutionResult, ExecutionStatus};
use crate::platform::network::{self, HttpRequest};
use std::collections::BTreeMap;
use std::time::Instant;

pub struct WebhookJobRunner {
    config: WebhookJobConfig,
    headers: BTreeMap<String, String>,
}

impl WebhookJobRunner {
    pub fn new(config: WebhookJobConfig) -> Self {
        let headers = request_headers(config.headers.as_ref());
        WebhookJobRunner { config, headers }
    }
}

/// User headers plus a JSON content type unless the user set one
fn request_headers(user: Option<&BTreeMap<String, String>>) -> BTreeMap<String, String> {
    let mut headers = user.cloned().unwrap_or_default();
    let has_content_type = headers
        .keys()
        .any(|k| k.eq_ignore_ascii_case("content-type"));
    if !has_content_type {
        headers.insert("Content-Type".to_string(), "application/json".to_string());
    }
    headers
}

impl JobRunner for WebhookJobRunner {
    fn describe(&self) -> String {
        format!("webhook executions against {}", self.config.endpoint)
    }

    fn execute(&self, context: &ExecutionContext) -> ExecutionResult {
        let start = Instant::now();

        let body = match serde_json::to_vec(&self.config.payload) {
            Ok(body) => body,
            Err(e) => {
                return ExecutionResult::new(
                    context.processor_id.as_str(),
                    ExecutionStatus::Error,
                    elapsed_ms(start),
                )
                .with_error(format!("Failed to encode payload: {}", e));
            }
        };

        let request = HttpRequest {
            method: HttpMethod::Post,
            url: &self.config.endpoint,
            headers: Some(&self.headers),
            body: Some(body),
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
