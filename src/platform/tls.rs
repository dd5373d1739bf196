//! TLS certificate probing.
//!
//! Performs a verified handshake against the webpki root store and extracts
//! the issuer and validity window of the leaf certificate.
//!
//! # Graceful Degradation
//!
//! This module handles errors gracefully:
//! - Untrusted, expired or mismatched certificates: TlsError::Certificate
//! - Deadline exceeded during connect or handshake: TlsError::Timeout
//! - Connection and protocol failures: TlsError::Network / TlsError::Handshake
//! - Certificates that cannot be decoded: TlsError::Parse
//!
//! The certificate decoder reads only the fields it needs and never panics
//! on malformed input.

use crate::platform::network::{self, NetworkError};
use chrono::{DateTime, NaiveDateTime, Utc};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TlsError {
    #[error("{0}")]
    Network(NetworkError),

    #[error("Invalid server name: {0}")]
    InvalidServerName(String),

    #[error("TLS handshake timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Certificate verification failed: {0}")]
    Certificate(String),

    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    #[error("Server presented no certificate")]
    NoCertificate,

    #[error("Failed to parse certificate: {0}")]
    Parse(String),
}

/// Fields of an X.509 certificate relevant to expiry and issuer checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Issuer distinguished name, e.g. "C=US, O=Example, CN=Example CA"
    pub issuer: String,
    pub issuer_common_name: Option<String>,
    pub issuer_organization: Option<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl CertificateInfo {
    /// Whole days of validity left at `now`; negative once expired
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.not_after - now).num_days()
    }

    /// Whether the issuer matches `expected`.
    ///
    /// Matches the common name or organization exactly (ignoring case), or
    /// any substring of the full distinguished name.
    pub fn issuer_matches(&self, expected: &str) -> bool {
        let expected = expected.trim().to_lowercase();
        if expected.is_empty() {
            return true;
        }

        let exact = [&self.issuer_common_name, &self.issuer_organization]
            .into_iter()
            .flatten()
            .any(|name| name.to_lowercase() == expected);

        exact || self.issuer.to_lowercase().contains(&expected)
    }
}

/// Certificate served by a peer
#[derive(Debug, Clone)]
pub struct PeerCertificate {
    /// Leaf certificate in DER form
    pub der: Vec<u8>,
    pub info: CertificateInfo,
}

/// Connect to host:port, complete a verified handshake and return the leaf
/// certificate. The whole exchange is bounded by `timeout_ms`.
pub fn probe_certificate(host: &str, port: u16, timeout_ms: u64) -> Result<PeerCertificate, TlsError> {
    let start = Instant::now();
    let deadline = Duration::from_millis(timeout_ms);

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| TlsError::InvalidServerName(host.to_string()))?;

    let mut socket = network::connect_tcp(host, port, timeout_ms).map_err(|e| match e {
        NetworkError::Timeout { timeout_ms } => TlsError::Timeout { timeout_ms },
        other => TlsError::Network(other),
    })?;

    let mut conn = ClientConnection::new(client_config()?, server_name)
        .map_err(|e| TlsError::Handshake(e.to_string()))?;

    while conn.is_handshaking() {
        let remaining = match deadline.checked_sub(start.elapsed()) {
            Some(r) if !r.is_zero() => r,
            _ => return Err(TlsError::Timeout { timeout_ms }),
        };
        socket
            .set_read_timeout(Some(remaining))
            .and_then(|_| socket.set_write_timeout(Some(remaining)))
            .map_err(|e| TlsError::Handshake(e.to_string()))?;

        match conn.complete_io(&mut socket) {
            Ok((0, 0)) if conn.is_handshaking() && !conn.wants_write() => {
                return Err(TlsError::Handshake("Connection closed during handshake".to_string()));
            }
            Ok(_) => {}
            Err(e) => return Err(classify_io(e, timeout_ms)),
        }
    }

    let der = conn
        .peer_certificates()
        .and_then(|certs| certs.first())
        .map(|cert| cert.as_ref().to_vec())
        .ok_or(TlsError::NoCertificate)?;

    debug!(host, port, bytes = der.len(), "Received peer certificate");

    let info = parse_certificate(&der)?;
    Ok(PeerCertificate { der, info })
}

fn client_config() -> Result<Arc<ClientConfig>, TlsError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| TlsError::Handshake(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Arc::new(config))
}

fn classify_io(error: io::Error, timeout_ms: u64) -> TlsError {
    if matches!(error.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) {
        return TlsError::Timeout { timeout_ms };
    }

    let tls_error = error
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>());
    match tls_error {
        Some(rustls::Error::InvalidCertificate(reason)) => TlsError::Certificate(format!("{:?}", reason)),
        Some(other) => TlsError::Handshake(other.to_string()),
        None => TlsError::Handshake(error.to_string()),
    }
}

// DER decoding

const TAG_SEQUENCE: u8 = 0x30;
const TAG_SET: u8 = 0x31;
const TAG_OID: u8 = 0x06;
const TAG_UTC_TIME: u8 = 0x17;
const TAG_GENERALIZED_TIME: u8 = 0x18;
const TAG_BMP_STRING: u8 = 0x1e;
const TAG_EXPLICIT_VERSION: u8 = 0xa0;

struct DerReader<'a> {
    data: &'a [u8],
}

impl<'a> DerReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        DerReader { data }
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn peek_tag(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Read one TLV, returning its tag and contents
    fn read(&mut self) -> Result<(u8, &'a [u8]), TlsError> {
        let (&tag, rest) = self
            .data
            .split_first()
            .ok_or_else(|| TlsError::Parse("unexpected end of data".to_string()))?;
        let (&first, rest) = rest
            .split_first()
            .ok_or_else(|| TlsError::Parse("missing length".to_string()))?;

        let (len, rest) = if first < 0x80 {
            (first as usize, rest)
        } else {
            let count = (first & 0x7f) as usize;
            if count == 0 || count > 4 || rest.len() < count {
                return Err(TlsError::Parse("unsupported length encoding".to_string()));
            }
            let len = rest[..count].iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
            (len, &rest[count..])
        };

        if rest.len() < len {
            return Err(TlsError::Parse("truncated element".to_string()));
        }
        let (contents, remaining) = rest.split_at(len);
        self.data = remaining;
        Ok((tag, contents))
    }

    fn expect(&mut self, expected: u8) -> Result<&'a [u8], TlsError> {
        let (tag, contents) = self.read()?;
        if tag != expected {
            return Err(TlsError::Parse(format!(
                "expected tag 0x{:02x}, found 0x{:02x}",
                expected, tag
            )));
        }
        Ok(contents)
    }
}

/// Decode issuer and validity from a DER-encoded X.509 certificate
pub fn parse_certificate(der: &[u8]) -> Result<CertificateInfo, TlsError> {
    let certificate = DerReader::new(der).expect(TAG_SEQUENCE)?;
    let mut tbs = DerReader::new(DerReader::new(certificate).expect(TAG_SEQUENCE)?);

    if tbs.peek_tag() == Some(TAG_EXPLICIT_VERSION) {
        tbs.read()?;
    }
    tbs.read()?; // serialNumber
    tbs.expect(TAG_SEQUENCE)?; // signature algorithm

    let issuer = parse_name(tbs.expect(TAG_SEQUENCE)?)?;

    let mut validity = DerReader::new(tbs.expect(TAG_SEQUENCE)?);
    let not_before = parse_time(validity.read()?)?;
    let not_after = parse_time(validity.read()?)?;

    let find = |label: &str| {
        issuer
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.clone())
    };

    Ok(CertificateInfo {
        issuer_common_name: find("CN"),
        issuer_organization: find("O"),
        issuer: issuer
            .iter()
            .map(|(label, value)| format!("{}={}", label, value))
            .collect::<Vec<_>>()
            .join(", "),
        not_before,
        not_after,
    })
}

fn parse_name(contents: &[u8]) -> Result<Vec<(String, String)>, TlsError> {
    let mut attributes = Vec::new();
    let mut rdns = DerReader::new(contents);

    while !rdns.is_empty() {
        let mut set = DerReader::new(rdns.expect(TAG_SET)?);
        while !set.is_empty() {
            let mut attribute = DerReader::new(set.expect(TAG_SEQUENCE)?);
            let oid = attribute.expect(TAG_OID)?;
            let (tag, value) = attribute.read()?;
            attributes.push((attribute_label(oid), decode_string(tag, value)));
        }
    }

    Ok(attributes)
}

fn attribute_label(oid: &[u8]) -> String {
    match oid {
        [0x55, 0x04, 0x03] => "CN".to_string(),
        [0x55, 0x04, 0x06] => "C".to_string(),
        [0x55, 0x04, 0x07] => "L".to_string(),
        [0x55, 0x04, 0x08] => "ST".to_string(),
        [0x55, 0x04, 0x0a] => "O".to_string(),
        [0x55, 0x04, 0x0b] => "OU".to_string(),
        other => dotted_oid(other),
    }
}

fn dotted_oid(oid: &[u8]) -> String {
    let Some((&first, rest)) = oid.split_first() else {
        return String::new();
    };

    let mut parts = vec![(first / 40).to_string(), (first % 40).to_string()];
    let mut value: u64 = 0;
    for &byte in rest {
        value = (value << 7) | u64::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            parts.push(value.to_string());
            value = 0;
        }
    }
    parts.join(".")
}

fn decode_string(tag: u8, value: &[u8]) -> String {
    if tag == TAG_BMP_STRING {
        let units: Vec<u16> = value
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(value).into_owned()
}

fn parse_time((tag, contents): (u8, &[u8])) -> Result<DateTime<Utc>, TlsError> {
    let text = std::str::from_utf8(contents)
        .map_err(|_| TlsError::Parse("time is not ASCII".to_string()))?;

    let full = match tag {
        // Two-digit years below 50 belong to the 2000s
        TAG_UTC_TIME => {
            let year: u32 = text
                .get(..2)
                .and_then(|y| y.parse().ok())
                .ok_or_else(|| TlsError::Parse(format!("invalid UTCTime: {}", text)))?;
            let century = if year < 50 { "20" } else { "19" };
            format!("{}{}", century, text)
        }
        TAG_GENERALIZED_TIME => text.to_string(),
        other => return Err(TlsError::Parse(format!("unexpected time tag 0x{:02x}", other))),
    };

    NaiveDateTime::parse_from_str(&full, "%Y%m%d%H%M%SZ")
        .map(|naive| naive.and_utc())
        .map_err(|e| TlsError::Parse(format!("invalid time {}: {}", text, e)))
}
