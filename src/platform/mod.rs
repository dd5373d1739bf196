//! Platform abstraction layer.
//!
//! Provides consistent interfaces for:
//! - HTTP requests and TCP connections
//! - TLS handshakes and certificate decoding
//! - The CI host's output, summary and annotation channels

pub mod actions;
pub mod network;
pub mod tls;
