//! DNS job runner.
//!
//! Each attempt builds a fresh resolver with caching disabled, so repeated
//! attempts query the nameserver rather than a local cache.
//!
//! Record values are normalized before comparison and hashing:
//! - names lose their trailing dot and are lowercased
//! - MX records compare by exchange host, SOA records by primary nameserver
//! - TXT records join their character strings
//!
//! The digest covers the sorted normalized values joined by newlines, so two
//! attempts agree when they saw the same record set in any order.

use super::{elapsed_ms, hash_content, DnsJobConfig, DnsRecordType, ExecutionContext, JobRunner};
use crate::engine::result::{ExecutionResult, ExecutionStatus};
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::Resolver;
use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_DNS_PORT: u16 = 53;

pub struct DnsJobRunner {
    config: DnsJobConfig,
}

impl DnsJobRunner {
    pub fn new(config: DnsJobConfig) -> Self {
        DnsJobRunner { config }
    }

    fn resolver(&self) -> Result<Resolver, String> {
        let (resolver_config, mut opts) = match self.config.nameserver {
            Some(ref nameserver) => {
                let addr = parse_nameserver(nameserver)
                    .ok_or_else(|| format!("Invalid nameserver: {}", nameserver))?;
                let group =
                    NameServerConfigGroup::from_ips_clear(&[addr.ip()], addr.port(), true);
                (
                    ResolverConfig::from_parts(None, vec![], group),
                    ResolverOpts::default(),
                )
            }
            None => hickory_resolver::system_conf::read_system_conf().unwrap_or_else(|e| {
                debug!(error = %e, "System resolver config unavailable, using defaults");
                (ResolverConfig::default(), ResolverOpts::default())
            }),
        };

        opts.timeout = Duration::from_millis(self.config.timeout_ms);
        opts.attempts = 1;
        opts.cache_size = 0;

        Resolver::new(resolver_config, opts).map_err(|e| format!("Failed to create resolver: {}", e))
    }

    fn timed_out(&self, id: &str, latency_ms: u64) -> ExecutionResult {
        ExecutionResult::new(id, ExecutionStatus::Timeout, latency_ms)
            .with_error(format!("DNS lookup timed out after {}ms", self.config.timeout_ms))
    }

    fn judge(&self, id: &str, lookup: Result<Vec<String>, ResolveError>, latency_ms: u64) -> ExecutionResult {
        let record_type = self.config.record_type;
        let hostname = &self.config.hostname;

        // Anything that finishes after the budget is spent is a timeout,
        // whichever transport error the resolver surfaced last
        if latency_ms >= self.config.timeout_ms {
            return self.timed_out(id, latency_ms);
        }

        let values = match lookup {
            Ok(values) => values,
            Err(e) => {
                return match e.kind() {
                    ResolveErrorKind::Timeout => self.timed_out(id, latency_ms),
                    ResolveErrorKind::NoRecordsFound { .. } => {
                        ExecutionResult::new(id, ExecutionStatus::Failure, latency_ms)
                            .with_error(format!("No {} records found for {}", record_type, hostname))
                    }
                    _ => ExecutionResult::new(id, ExecutionStatus::Error, latency_ms)
                        .with_error(format!("DNS lookup failed: {}", e)),
                };
            }
        };

        judge_records(id, record_type, &values, self.config.expected_values.as_deref(), latency_ms)
    }
}

impl JobRunner for DnsJobRunner {
    fn describe(&self) -> String {
        format!("DNS lookups for {} ({})", self.config.hostname, self.config.record_type)
    }

    fn execute(&self, context: &ExecutionContext) -> ExecutionResult {
        let start = Instant::now();
        let id = context.processor_id.as_str();

        let resolver = match self.resolver() {
            Ok(resolver) => resolver,
            Err(message) => {
                return ExecutionResult::new(id, ExecutionStatus::Error, elapsed_ms(start))
                    .with_error(message);
            }
        };

        // The resolver's own timeout applies per nameserver, so the lookup
        // runs on a helper thread and the attempt waits at most the budget.
        let record_type = self.config.record_type;
        let name = fully_qualified(&self.config.hostname);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let wanted = hickory_record_type(record_type);
            let lookup = resolver.lookup(name, wanted).map(|lookup| {
                lookup
                    .iter()
                    .filter(|rdata| rdata.record_type() == wanted)
                    .map(|rdata| normalize_record_value(record_type, &rdata_text(rdata)))
                    .collect::<Vec<_>>()
            });
            let _ = tx.send(lookup);
        });

        match rx.recv_timeout(Duration::from_millis(self.config.timeout_ms)) {
            Ok(lookup) => self.judge(id, lookup, elapsed_ms(start)),
            Err(RecvTimeoutError::Timeout) => self.timed_out(id, elapsed_ms(start)),
            Err(RecvTimeoutError::Disconnected) => {
                ExecutionResult::new(id, ExecutionStatus::Error, elapsed_ms(start))
                    .with_error("DNS lookup thread exited without a result")
            }
        }
    }
}

/// Compare a resolved record set against the expected values and hash it
pub(crate) fn judge_records(
    id: &str,
    record_type: DnsRecordType,
    values: &[String],
    expected: Option<&[String]>,
    latency_ms: u64,
) -> ExecutionResult {
    let sorted: BTreeSet<&str> = values.iter().map(String::as_str).collect();
    let joined: Vec<&str> = sorted.into_iter().collect();
    let hash = hash_content(joined.join("\n").as_bytes());

    if let Some(expected) = expected {
        if !values_match(record_type, values, expected) {
            return ExecutionResult::new(id, ExecutionStatus::Failure, latency_ms)
                .with_hash(hash)
                .with_error(format!(
                    "Expected records [{}], got [{}]",
                    expected.join(", "),
                    joined.join(", ")
                ));
        }
    }

    ExecutionResult::new(id, ExecutionStatus::Success, latency_ms).with_hash(hash)
}

/// Unordered set comparison of normalized record values
pub fn values_match(record_type: DnsRecordType, actual: &[String], expected: &[String]) -> bool {
    let actual: BTreeSet<String> = actual
        .iter()
        .map(|v| normalize_record_value(record_type, v))
        .collect();
    let expected: BTreeSet<String> = expected
        .iter()
        .map(|v| normalize_record_value(record_type, v))
        .collect();
    actual == expected
}

/// Canonical text form of a record value
pub fn normalize_record_value(record_type: DnsRecordType, value: &str) -> String {
    let trimmed = value.trim();
    match record_type {
        DnsRecordType::Txt => trimmed.to_string(),
        _ => trimmed.trim_end_matches('.').to_lowercase(),
    }
}

fn rdata_text(rdata: &RData) -> String {
    match rdata {
        RData::MX(mx) => mx.exchange().to_string(),
        RData::SOA(soa) => soa.mname().to_string(),
        RData::TXT(txt) => txt
            .txt_data()
            .iter()
            .map(|chunk| String::from_utf8_lossy(chunk))
            .collect(),
        other => other.to_string(),
    }
}

fn hickory_record_type(record_type: DnsRecordType) -> RecordType {
    match record_type {
        DnsRecordType::A => RecordType::A,
        DnsRecordType::Aaaa => RecordType::AAAA,
        DnsRecordType::Cname => RecordType::CNAME,
        DnsRecordType::Mx => RecordType::MX,
        DnsRecordType::Txt => RecordType::TXT,
        DnsRecordType::Ns => RecordType::NS,
        DnsRecordType::Soa => RecordType::SOA,
        DnsRecordType::Ptr => RecordType::PTR,
    }
}

// A trailing dot keeps the resolver from walking search domains
fn fully_qualified(hostname: &str) -> String {
    if hostname.ends_with('.') {
        hostname.to_string()
    } else {
        format!("{}.", hostname)
    }
}

/// Parse "IP" or "IP:port" ("[v6]:port" for IPv6)
pub fn parse_nameserver(value: &str) -> Option<SocketAddr> {
    let value = value.trim();
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Some(addr);
    }
    value
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, DEFAULT_DNS_PORT))
}
