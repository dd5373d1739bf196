//! Quorum engine module.
//!
//! Provides execution orchestration and quorum aggregation.

pub mod orchestrator;
pub mod result;
