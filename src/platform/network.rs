//! Network transport interface.
//!
//! Provides HTTP requests and raw TCP connections for the job runners.
//!
//! # Graceful Degradation
//!
//! This module handles errors gracefully:
//! - Deadline exceeded: Returns NetworkError::Timeout with the configured budget
//! - Malformed URL or header: Returns NetworkError::InvalidRequest
//! - DNS, refused connection, TLS and transfer failures: Returns NetworkError::Request
//! - Non-2xx responses: Returned as HttpResponse for the caller to judge
//!
//! All operations respect timeout parameters. No function will block
//! indefinitely or panic.

use crate::jobs::HttpMethod;
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("quorumci/", env!("CARGO_PKG_VERSION"));

/// Transport errors surfaced to runners
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Connection to {address} failed: {message}")]
    Connect { address: String, message: String },
}

impl NetworkError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetworkError::Timeout { .. })
    }
}

/// Outgoing HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest<'a> {
    pub method: HttpMethod,
    pub url: &'a str,
    pub headers: Option<&'a BTreeMap<String, String>>,
    pub body: Option<Vec<u8>>,
    pub timeout_ms: u64,
}

/// Received HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: Vec<u8>,
}

/// Send an HTTP request and read the full response body.
///
/// A client is built per call so that attempts never share pooled
/// connections; each attempt observes the endpoint independently.
pub fn send_request(request: &HttpRequest<'_>) -> Result<HttpResponse, NetworkError> {
    let timeout = Duration::from_millis(request.timeout_ms);

    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .pool_max_idle_per_host(0)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| NetworkError::InvalidRequest(e.to_string()))?;

    let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
        .map_err(|e| NetworkError::InvalidRequest(e.to_string()))?;

    let mut builder = client.request(method, request.url);
    if let Some(headers) = request.headers {
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }
    if let Some(ref body) = request.body {
        builder = builder.body(body.clone());
    }

    debug!(method = %request.method, url = request.url, "Sending request");

    let response = builder
        .send()
        .map_err(|e| classify(e, request.timeout_ms))?;
    let status_code = response.status().as_u16();
    let body = response
        .bytes()
        .map_err(|e| classify(e, request.timeout_ms))?
        .to_vec();

    Ok(HttpResponse { status_code, body })
}

fn classify(error: reqwest::Error, timeout_ms: u64) -> NetworkError {
    if error.is_timeout() {
        NetworkError::Timeout { timeout_ms }
    } else if error.is_builder() {
        NetworkError::InvalidRequest(error.to_string())
    } else {
        NetworkError::Request(error_chain(&error))
    }
}

// reqwest's top-level message is generic; the cause carries the useful part.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Open a TCP connection to host:port within `timeout_ms`.
///
/// Every resolved address is tried in turn until the deadline runs out.
pub fn connect_tcp(host: &str, port: u16, timeout_ms: u64) -> Result<TcpStream, NetworkError> {
    let start = Instant::now();
    let deadline = Duration::from_millis(timeout_ms);
    let address = format!("{}:{}", host, port);

    let addrs = resolve(host, port, deadline).map_err(|e| match e {
        Some(e) => NetworkError::Connect {
            address: address.clone(),
            message: format!("DNS resolution failed: {}", e),
        },
        None => NetworkError::Timeout { timeout_ms },
    })?;

    if addrs.is_empty() {
        return Err(NetworkError::Connect {
            address,
            message: "No address resolved".to_string(),
        });
    }

    let mut last_error = None;
    for addr in &addrs {
        let remaining = match deadline.checked_sub(start.elapsed()) {
            Some(r) if !r.is_zero() => r,
            _ => return Err(NetworkError::Timeout { timeout_ms }),
        };

        match TcpStream::connect_timeout(addr, remaining) {
            Ok(stream) => return Ok(stream),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                return Err(NetworkError::Timeout { timeout_ms });
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(NetworkError::Connect {
        address,
        message: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Connection failed".to_string()),
    })
}

/// Resolve host:port on a helper thread so a slow system resolver cannot
/// outlive the deadline.
///
/// `Err(None)` means the deadline passed first; the lookup thread is left
/// to finish on its own.
fn resolve(host: &str, port: u16, deadline: Duration) -> Result<Vec<SocketAddr>, Option<std::io::Error>> {
    // Literal addresses need no lookup
    if let Ok(ip) = host.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, port)]);
    }

    let (tx, rx) = mpsc::channel();
    let target = format!("{}:{}", host, port);
    thread::spawn(move || {
        let result = target.to_socket_addrs().map(|addrs| addrs.collect::<Vec<_>>());
        let _ = tx.send(result);
    });

    match rx.recv_timeout(deadline) {
        Ok(result) => result.map_err(Some),
        Err(RecvTimeoutError::Timeout) => {
            debug!(host, "Address lookup outlived the deadline");
            Err(None)
        }
        Err(RecvTimeoutError::Disconnected) => Err(Some(std::io::Error::new(
            std::io::ErrorKind::Other,
            "address lookup thread exited",
        ))),
    }
}
