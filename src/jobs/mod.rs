//! Job configurations and runners.
//!
//! Each job type has a configuration struct produced by the normalizer and a
//! runner that executes one attempt of it:
//! - HTTP: request a URL and compare the status code
//! - Webhook: POST a JSON payload to an endpoint
//! - Script: run a node or bash script and check its exit code
//! - DNS: resolve a record set and optionally compare it
//! - TLS: handshake and inspect the served certificate
//!
//! # Graceful Degradation
//!
//! Runners never return errors for check outcomes:
//! - Unexpected status, exit code or record set: `ExecutionStatus::Failure`
//! - Deadline exceeded: `ExecutionStatus::Timeout`
//! - Network, spawn or handshake problems: `ExecutionStatus::Error`
//!
//! Every result carries the processor id it was given and the latency of
//! the operation itself.

pub mod dns;
pub mod http;
pub mod script;
pub mod tls;
pub mod webhook;

use crate::engine::result::ExecutionResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

pub use dns::DnsJobRunner;
pub use http::HttpJobRunner;
pub use script::ScriptJobRunner;
pub use tls::TlsJobRunner;
pub use webhook::WebhookJobRunner;

/// Default port for TLS probes
pub const DEFAULT_TLS_PORT: u16 = 443;

/// Status code expected when none could be parsed
pub const DEFAULT_EXPECTED_STATUS: i32 = 200;

/// Per-attempt execution context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub processor_id: String,
}

impl ExecutionContext {
    pub fn new(processor_id: impl Into<String>) -> Self {
        ExecutionContext {
            processor_id: processor_id.into(),
        }
    }
}

/// Executes one attempt of a job.
///
/// Implementations must tag the result with `context.processor_id` and
/// enforce their own deadline.
pub trait JobRunner: Send + Sync {
    /// What one execution does, for progress reporting
    /// (e.g., "executions against https://example.com").
    fn describe(&self) -> String;

    /// Run a single attempt
    fn execute(&self, context: &ExecutionContext) -> ExecutionResult;
}

/// Job type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Http,
    Webhook,
    Script,
    Dns,
    Tls,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::Http,
        JobKind::Webhook,
        JobKind::Script,
        JobKind::Dns,
        JobKind::Tls,
    ];

    /// Parse a job type; names are case-sensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "http" => Some(JobKind::Http),
            "webhook" => Some(JobKind::Webhook),
            "script" => Some(JobKind::Script),
            "dns" => Some(JobKind::Dns),
            "tls" => Some(JobKind::Tls),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Http => "http",
            JobKind::Webhook => "webhook",
            JobKind::Script => "script",
            JobKind::Dns => "dns",
            JobKind::Tls => "tls",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Patch,
}

impl HttpMethod {
    /// Parse a method name, ignoring case
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            "HEAD" => Some(HttpMethod::Head),
            "PATCH" => Some(HttpMethod::Patch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acceptable status codes: a single code or a set of codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpectedStatus {
    Single(i32),
    AnyOf(Vec<i32>),
}

impl ExpectedStatus {
    pub fn matches(&self, code: i32) -> bool {
        match self {
            ExpectedStatus::Single(expected) => *expected == code,
            ExpectedStatus::AnyOf(codes) => codes.contains(&code),
        }
    }
}

impl Default for ExpectedStatus {
    fn default() -> Self {
        ExpectedStatus::Single(DEFAULT_EXPECTED_STATUS)
    }
}

impl fmt::Display for ExpectedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedStatus::Single(code) => write!(f, "{}", code),
            ExpectedStatus::AnyOf(codes) => {
                let joined: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", joined.join(","))
            }
        }
    }
}

/// Script interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptRuntime {
    #[default]
    Node,
    Bash,
}

impl ScriptRuntime {
    /// Parse a runtime name; names are case-sensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "node" => Some(ScriptRuntime::Node),
            "bash" => Some(ScriptRuntime::Bash),
            _ => None,
        }
    }

    /// Interpreter binary name
    pub fn program(&self) -> &'static str {
        match self {
            ScriptRuntime::Node => "node",
            ScriptRuntime::Bash => "bash",
        }
    }
}

impl fmt::Display for ScriptRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DnsRecordType {
    #[default]
    A,
    Aaaa,
    Cname,
    Mx,
    Txt,
    Ns,
    Soa,
    Ptr,
}

impl DnsRecordType {
    pub const ALL: [DnsRecordType; 8] = [
        DnsRecordType::A,
        DnsRecordType::Aaaa,
        DnsRecordType::Cname,
        DnsRecordType::Mx,
        DnsRecordType::Txt,
        DnsRecordType::Ns,
        DnsRecordType::Soa,
        DnsRecordType::Ptr,
    ];

    /// Parse a record type, ignoring case
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.to_uppercase();
        Self::ALL.into_iter().find(|t| t.as_str() == upper)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DnsRecordType::A => "A",
            DnsRecordType::Aaaa => "AAAA",
            DnsRecordType::Cname => "CNAME",
            DnsRecordType::Mx => "MX",
            DnsRecordType::Txt => "TXT",
            DnsRecordType::Ns => "NS",
            DnsRecordType::Soa => "SOA",
            DnsRecordType::Ptr => "PTR",
        }
    }
}

impl fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpJobConfig {
    pub url: String,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub expected_status: ExpectedStatus,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookJobConfig {
    pub endpoint: String,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    pub expected_status: ExpectedStatus,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptJobConfig {
    pub runtime: ScriptRuntime,
    /// Script source text
    pub script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsJobConfig {
    pub hostname: String,
    pub record_type: DnsRecordType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_values: Option<Vec<String>>,
    /// Nameserver address (IP or IP:port); system resolver when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nameserver: Option<String>,
    pub timeout_ms: u64,
}

fn default_tls_port() -> u16 {
    DEFAULT_TLS_PORT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsJobConfig {
    pub hostname: String,
    #[serde(default = "default_tls_port")]
    pub port: u16,
    /// Minimum remaining certificate validity; not enforced when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_days_valid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_issuer: Option<String>,
    pub timeout_ms: u64,
}

/// A fully validated job, one variant per job type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobConfig {
    Http(HttpJobConfig),
    Webhook(WebhookJobConfig),
    Script(ScriptJobConfig),
    Dns(DnsJobConfig),
    Tls(TlsJobConfig),
}

impl JobConfig {
    pub fn kind(&self) -> JobKind {
        match self {
            JobConfig::Http(_) => JobKind::Http,
            JobConfig::Webhook(_) => JobKind::Webhook,
            JobConfig::Script(_) => JobKind::Script,
            JobConfig::Dns(_) => JobKind::Dns,
            JobConfig::Tls(_) => JobKind::Tls,
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        match self {
            JobConfig::Http(c) => c.timeout_ms,
            JobConfig::Webhook(c) => c.timeout_ms,
            JobConfig::Script(c) => c.timeout_ms,
            JobConfig::Dns(c) => c.timeout_ms,
            JobConfig::Tls(c) => c.timeout_ms,
        }
    }

    /// Build the runner for this job
    pub fn runner(&self) -> Box<dyn JobRunner> {
        match self {
            JobConfig::Http(c) => Box::new(HttpJobRunner::new(c.clone())),
            JobConfig::Webhook(c) => Box::new(WebhookJobRunner::new(c.clone())),
            JobConfig::Script(c) => Box::new(ScriptJobRunner::new(c.clone())),
            JobConfig::Dns(c) => Box::new(DnsJobRunner::new(c.clone())),
            JobConfig::Tls(c) => Box::new(TlsJobRunner::new(c.clone())),
        }
    }

    /// Setting/value pairs describing the job, for reports
    pub fn settings(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![("Type", self.kind().to_string())];

        match self {
            JobConfig::Http(c) => {
                rows.push(("URL", c.url.clone()));
                rows.push(("Method", c.method.to_string()));
                rows.push(("Expected Status", c.expected_status.to_string()));
            }
            JobConfig::Webhook(c) => {
                rows.push(("Endpoint", c.endpoint.clone()));
                rows.push(("Expected Status", c.expected_status.to_string()));
            }
            JobConfig::Script(c) => {
                rows.push(("Runtime", c.runtime.to_string()));
                if let Some(ref args) = c.args {
                    rows.push(("Arguments", args.join(", ")));
                }
            }
            JobConfig::Dns(c) => {
                rows.push(("Hostname", c.hostname.clone()));
                rows.push(("Record Type", c.record_type.to_string()));
                if let Some(ref nameserver) = c.nameserver {
                    rows.push(("Nameserver", nameserver.clone()));
                }
                if let Some(ref values) = c.expected_values {
                    rows.push(("Expected Values", values.join(", ")));
                }
            }
            JobConfig::Tls(c) => {
                rows.push(("Hostname", c.hostname.clone()));
                rows.push(("Port", c.port.to_string()));
                if let Some(days) = c.min_days_valid {
                    rows.push(("Min Days Valid", days.to_string()));
                }
                if let Some(ref issuer) = c.expected_issuer {
                    rows.push(("Expected Issuer", issuer.clone()));
                }
            }
        }

        rows.push(("Timeout", format!("{}ms", self.timeout_ms())));
        rows
    }
}

/// Hex SHA-256 digest of response content
pub fn hash_content(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Milliseconds elapsed since `start`
pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Shorten a message for inclusion in a result
pub(crate) fn truncate_message(message: &str, max_chars: usize) -> String {
    let trimmed = message.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
