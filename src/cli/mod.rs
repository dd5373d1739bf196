//! CLI module for argument parsing and output formatting.
//!
//! Arguments are parsed with clap; every job input can also come from the
//! CI host's `INPUT_<NAME>` environment variables.

pub mod args;
pub mod output;
