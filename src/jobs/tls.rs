//! TLS certificate job runner.

use super::{elapsed_ms, hash_content, ExecutionContext, JobRunner, TlsJobConfig};
use crate::engine::result::{ExecutionResult, ExecutionStatus};
use crate::platform::tls::{self, PeerCertificate, TlsError};
use chrono::{DateTime, Utc};
use std::time::Instant;

pub struct TlsJobRunner {
    config: TlsJobConfig,
}

impl TlsJobRunner {
    pub fn new(config: TlsJobConfig) -> Self {
        TlsJobRunner { config }
    }
}

impl JobRunner for TlsJobRunner {
    fn describe(&self) -> String {
        format!("TLS certificate checks for {}:{}", self.config.hostname, self.config.port)
    }

    fn execute(&self, context: &ExecutionContext) -> ExecutionResult {
        let start = Instant::now();
        let probe = tls::probe_certificate(&self.config.hostname, self.config.port, self.config.timeout_ms);
        judge_certificate(
            &context.processor_id,
            probe,
            &self.config,
            Utc::now(),
            elapsed_ms(start),
        )
    }
}

/// Judge a probed certificate against the validity and issuer requirements.
///
/// The digest is taken over the leaf certificate, so attempts agree when
/// they were served the same certificate.
pub(crate) fn judge_certificate(
    id: &str,
    probe: Result<PeerCertificate, TlsError>,
    config: &TlsJobConfig,
    now: DateTime<Utc>,
    latency_ms: u64,
) -> ExecutionResult {
    let certificate = match probe {
        Ok(certificate) => certificate,
        Err(e) => {
            let status = match e {
                TlsError::Timeout { .. } => ExecutionStatus::Timeout,
                TlsError::Certificate(_) => ExecutionStatus::Failure,
                _ => ExecutionStatus::Error,
            };
            return ExecutionResult::new(id, status, latency_ms).with_error(e.to_string());
        }
    };

    let info = &certificate.info;
    let result_with = |status| {
        ExecutionResult::new(id, status, latency_ms).with_hash(hash_content(&certificate.der))
    };

    if let Some(min_days) = config.min_days_valid {
        let days = info.days_remaining(now);
        if days < i64::from(min_days) {
            return result_with(ExecutionStatus::Failure).with_error(format!(
                "Certificate expires in {} days (minimum {})",
                days, min_days
            ));
        }
    }

    if let Some(ref expected) = config.expected_issuer {
        if !info.issuer_matches(expected) {
            return result_with(ExecutionStatus::Failure).with_error(format!(
                "Certificate issuer '{}' does not match expected '{}'",
                info.issuer, expected
            ));
        }
    }

    result_with(ExecutionStatus::Success)
}
