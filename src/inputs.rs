//! Input normalization.
//!
//! Turns the flat string parameters supplied by the CI host into exactly one
//! validated [`JobConfig`] plus its [`QuorumConfig`].
//!
//! Hard problems (missing target, invalid enum value, bad counts) abort with
//! `QuorumError::Validation` before anything runs. Soft problems (malformed
//! JSON headers, payload or script environment, unusable `min-days-valid`)
//! degrade to a default and are reported as warnings.

use crate::engine::result::QuorumConfig;
use crate::jobs::{
    DnsJobConfig, DnsRecordType, ExpectedStatus, HttpJobConfig, HttpMethod, JobConfig, JobKind,
    ScriptJobConfig, ScriptRuntime, TlsJobConfig, WebhookJobConfig, DEFAULT_EXPECTED_STATUS,
    DEFAULT_TLS_PORT,
};
use crate::{QuorumError, Result};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use tracing::{debug, warn};

/// Environment variable prefix used by the CI host for action inputs
pub const INPUT_ENV_PREFIX: &str = "INPUT_";

/// Flat name to value map of raw inputs.
///
/// Names are lowercase with hyphens (`timeout-ms`). Empty or whitespace-only
/// values read as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawInputs {
    values: BTreeMap<String, String>,
}

impl RawInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_lowercase(), value.into());
    }

    /// Trimmed value of `name`, or `None` when absent or empty
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Read inputs from `INPUT_<NAME>` environment variables
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Collect `INPUT_<NAME>` entries from an arbitrary variable list
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut inputs = RawInputs::new();
        for (key, value) in vars {
            if let Some(name) = key.strip_prefix(INPUT_ENV_PREFIX) {
                inputs.insert(name, value);
            }
        }
        inputs
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for RawInputs {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut inputs = RawInputs::new();
        for (name, value) in iter {
            inputs.insert(name.as_ref(), value);
        }
        inputs
    }
}

/// A validated job ready for orchestration
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedJob {
    pub job: JobConfig,
    pub quorum: QuorumConfig,
    /// Soft parse failures, in the order they were found
    pub warnings: Vec<String>,
}

/// Collects soft-parse warnings, logging each as it is recorded
#[derive(Default)]
struct Warnings(Vec<String>);

impl Warnings {
    fn push(&mut self, message: String) {
        warn!("{}", message);
        self.0.push(message);
    }
}

/// Validate raw inputs and build the job configuration.
///
/// Validation runs in a fixed order so the first problem reported is
/// stable: job type, per-type target, method, executions, quorum, timeout,
/// runtime, record type.
pub fn normalize(raw: &RawInputs) -> Result<NormalizedJob> {
    let mut warnings = Warnings::default();

    let type_input = raw
        .get("type")
        .ok_or_else(|| QuorumError::validation("Input required and not supplied: type"))?;
    let kind = JobKind::parse(type_input).ok_or_else(|| {
        QuorumError::validation(format!(
            "Invalid type: {}. Must be 'http', 'webhook', 'script', 'dns', or 'tls'",
            type_input
        ))
    })?;

    let url = raw.get("url");
    if kind == JobKind::Http && url.is_none() {
        return Err(QuorumError::validation("url is required for http job type"));
    }

    let endpoint = raw.get("endpoint");
    if kind == JobKind::Webhook && endpoint.is_none() {
        return Err(QuorumError::validation("endpoint is required for webhook job type"));
    }

    let script = raw.get("script");
    let script_file = raw.get("script-file");
    if kind == JobKind::Script && script.is_none() && script_file.is_none() {
        return Err(QuorumError::validation(
            "Either script or script-file is required for script job type",
        ));
    }

    let hostname = raw.get("hostname");
    if matches!(kind, JobKind::Dns | JobKind::Tls) && hostname.is_none() {
        return Err(QuorumError::validation(format!(
            "hostname is required for {} job type",
            kind
        )));
    }

    let method_input = raw.get("method").unwrap_or_default();
    let method = HttpMethod::parse(method_input);
    if kind == JobKind::Http && method.is_none() {
        return Err(QuorumError::validation(format!(
            "Invalid method: {}",
            method_input.to_uppercase()
        )));
    }

    let expected_status = raw
        .get("expected-status")
        .map(parse_expected_status)
        .unwrap_or_default();

    let executions = positive_count(raw.get("executions"));
    let required = positive_count(raw.get("quorum"));
    let quorum = QuorumConfig::new(executions, required)?;

    let timeout_ms = raw
        .get("timeout-ms")
        .and_then(parse_int)
        .filter(|t| *t >= 1)
        .ok_or_else(|| QuorumError::validation("timeout-ms must be a positive number"))?
        as u64;

    let runtime = match raw.get("runtime") {
        Some(input) => Some(ScriptRuntime::parse(input).ok_or_else(|| {
            QuorumError::validation(format!("Invalid runtime: {}. Must be 'node' or 'bash'", input))
        })?),
        None => None,
    };

    let record_type = match raw.get("record-type") {
        Some(input) => Some(DnsRecordType::parse(input).ok_or_else(|| {
            let valid: Vec<&str> = DnsRecordType::ALL.iter().map(|t| t.as_str()).collect();
            QuorumError::validation(format!(
                "Invalid record-type: {}. Must be one of: {}",
                input.to_uppercase(),
                valid.join(", ")
            ))
        })?),
        None => None,
    };

    let headers = raw
        .get("headers")
        .and_then(|v| parse_string_map("headers", v, &mut warnings));

    let job = match kind {
        JobKind::Http => JobConfig::Http(HttpJobConfig {
            url: url.unwrap_or_default().to_string(),
            method: method.unwrap_or(HttpMethod::Get),
            headers,
            body: raw.get("body").map(String::from),
            expected_status,
            timeout_ms,
        }),
        JobKind::Webhook => JobConfig::Webhook(WebhookJobConfig {
            endpoint: endpoint.unwrap_or_default().to_string(),
            payload: raw
                .get("payload")
                .and_then(|v| parse_json::<serde_json::Value>("payload", v, &mut warnings))
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            headers,
            expected_status,
            timeout_ms,
        }),
        JobKind::Script => JobConfig::Script(ScriptJobConfig {
            runtime: runtime.unwrap_or_default(),
            script: match script {
                Some(inline) => inline.to_string(),
                None => read_script_file(script_file.unwrap_or_default())?,
            },
            args: raw.get("script-args").map(parse_list),
            env: raw
                .get("script-env")
                .and_then(|v| parse_string_map("script-env", v, &mut warnings)),
            timeout_ms,
        }),
        JobKind::Dns => JobConfig::Dns(DnsJobConfig {
            hostname: hostname.unwrap_or_default().to_string(),
            record_type: record_type.unwrap_or_default(),
            expected_values: raw.get("expected-values").map(parse_list),
            nameserver: raw.get("nameserver").map(String::from),
            timeout_ms,
        }),
        JobKind::Tls => JobConfig::Tls(TlsJobConfig {
            hostname: hostname.unwrap_or_default().to_string(),
            port: raw.get("port").map(parse_port).unwrap_or(DEFAULT_TLS_PORT),
            min_days_valid: raw
                .get("min-days-valid")
                .and_then(|v| parse_min_days(v, &mut warnings)),
            expected_issuer: raw.get("expected-issuer").map(String::from),
            timeout_ms,
        }),
    };

    debug!(job_type = %kind, executions, required, timeout_ms, "Inputs normalized");

    Ok(NormalizedJob {
        job,
        quorum,
        warnings: warnings.0,
    })
}

/// Parse a leading integer.
///
/// Leading whitespace and one sign are accepted and anything after the
/// digits is ignored, so `" 42ms"` is 42. Returns `None` without digits.
pub fn parse_int(value: &str) -> Option<i64> {
    let s = value.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let digits: &str = rest
        .find(|c: char| !c.is_ascii_digit())
        .map_or(rest, |end| &rest[..end]);
    if digits.is_empty() {
        return None;
    }

    let magnitude = digits
        .bytes()
        .fold(0i64, |acc, b| acc.saturating_mul(10).saturating_add(i64::from(b - b'0')));
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse `expected-status`: a single code or a comma-separated set.
///
/// Unparsable list entries are dropped; input that yields no code at all
/// falls back to 200.
pub fn parse_expected_status(value: &str) -> ExpectedStatus {
    if value.contains(',') {
        let codes: Vec<i32> = value
            .split(',')
            .filter_map(|s| parse_int(s.trim()))
            .filter_map(|n| i32::try_from(n).ok())
            .collect();
        if codes.is_empty() {
            ExpectedStatus::Single(DEFAULT_EXPECTED_STATUS)
        } else {
            ExpectedStatus::AnyOf(codes)
        }
    } else {
        ExpectedStatus::Single(
            parse_int(value)
                .and_then(|n| i32::try_from(n).ok())
                .unwrap_or(DEFAULT_EXPECTED_STATUS),
        )
    }
}

/// Split a comma-separated list, trimming each element
pub fn parse_list(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.trim().to_string()).collect()
}

// Invalid or non-positive counts become 0 so QuorumConfig reports them.
fn positive_count(value: Option<&str>) -> u32 {
    value
        .and_then(parse_int)
        .filter(|n| *n >= 1)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

fn parse_port(value: &str) -> u16 {
    parse_int(value)
        .and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p > 0)
        .unwrap_or(DEFAULT_TLS_PORT)
}

fn parse_min_days(value: &str, warnings: &mut Warnings) -> Option<u32> {
    match parse_int(value).and_then(|n| u32::try_from(n).ok()) {
        Some(days) => Some(days),
        None => {
            warnings.push(format!("Ignoring invalid min-days-valid: {}", value));
            None
        }
    }
}

fn parse_json<T: DeserializeOwned>(name: &str, value: &str, warnings: &mut Warnings) -> Option<T> {
    match serde_json::from_str(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(input = name, error = %e, "JSON input rejected");
            warnings.push(format!("Failed to parse {} as JSON: {}", name, value));
            None
        }
    }
}

/// Parse a JSON object whose values become strings.
///
/// Non-string scalars keep their JSON text (`3`, `true`), so one numeric
/// header does not discard the rest.
fn parse_string_map(name: &str, value: &str, warnings: &mut Warnings) -> Option<BTreeMap<String, String>> {
    let object = parse_json::<serde_json::Map<String, serde_json::Value>>(name, value, warnings)?;
    Some(
        object
            .into_iter()
            .map(|(key, value)| match value {
                serde_json::Value::String(text) => (key, text),
                other => (key, other.to_string()),
            })
            .collect(),
    )
}

fn read_script_file(path: &str) -> Result<String> {
    let mut contents = String::new();
    File::open(path)
        .and_then(|mut file| file.read_to_string(&mut contents))
        .map_err(|source| QuorumError::ScriptFile {
            path: path.to_string(),
            source,
        })?;
    debug!(path, bytes = contents.len(), "Read script file");
    Ok(contents)
}
