//! Integration tests for quorumci.
//!
//! These tests drive the public API end to end with scripted runners, a
//! local HTTP server and real bash processes.

pub mod aggregator_tests;
pub mod cli_tests;
pub mod orchestrator_tests;
