//! CI host integration.
//!
//! Publishes a quorum result through the host's file-based channels:
//! - `GITHUB_OUTPUT`: step outputs (`verdict`, `quorum-met`,
//!   `agreement-count`, `result-json`)
//! - `GITHUB_STEP_SUMMARY`: the Markdown summary document
//!
//! and prints `::warning::` / `::error::` workflow annotations.
//!
//! Outside the host every channel is simply absent and publishing is a
//! no-op.

use crate::cli::output::{MarkdownFormatter, OutputFormatter};
use crate::engine::result::QuorumResult;
use crate::jobs::JobConfig;
use crate::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

pub const OUTPUT_FILE_ENV: &str = "GITHUB_OUTPUT";
pub const SUMMARY_FILE_ENV: &str = "GITHUB_STEP_SUMMARY";
pub const ACTIONS_ENV: &str = "GITHUB_ACTIONS";

/// Host channels available to this process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnvironment {
    /// Running as a workflow step
    pub is_actions: bool,
    pub output_file: Option<PathBuf>,
    pub summary_file: Option<PathBuf>,
}

impl HostEnvironment {
    pub fn from_env() -> Self {
        let path = |name: &str| {
            std::env::var_os(name)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };

        HostEnvironment {
            is_actions: std::env::var(ACTIONS_ENV).map_or(false, |v| v == "true"),
            output_file: path(OUTPUT_FILE_ENV),
            summary_file: path(SUMMARY_FILE_ENV),
        }
    }

    /// Write step outputs and the step summary for `result`
    pub fn publish(&self, result: &QuorumResult, job: &JobConfig) -> Result<()> {
        if let Some(ref path) = self.output_file {
            write_outputs(path, result)?;
            debug!(path = %path.display(), "Wrote step outputs");
        }
        if let Some(ref path) = self.summary_file {
            append_file(path, &MarkdownFormatter::new().format(result, job))?;
            debug!(path = %path.display(), "Wrote step summary");
        }
        Ok(())
    }

    /// Print a warning annotation when running on the host
    pub fn warning(&self, message: &str) {
        if self.is_actions {
            println!("{}", annotation("warning", message));
        }
    }

    /// Print an error annotation when running on the host
    pub fn error(&self, message: &str) {
        if self.is_actions {
            println!("{}", annotation("error", message));
        }
    }
}

/// Step outputs for a result, as (name, value) pairs
pub fn step_outputs(result: &QuorumResult) -> Result<Vec<(&'static str, String)>> {
    Ok(vec![
        ("verdict", result.verdict.to_string()),
        ("quorum-met", result.quorum_met.to_string()),
        ("agreement-count", result.agreement_count.to_string()),
        ("result-json", serde_json::to_string(result)?),
    ])
}

/// Append step outputs using the delimiter form, which is safe for any value
pub fn write_outputs(path: &Path, result: &QuorumResult) -> Result<()> {
    let mut content = String::new();
    for (name, value) in step_outputs(result)? {
        let delimiter = format!("ghadelimiter_{}", Uuid::new_v4());
        content.push_str(&format!("{}<<{}\n{}\n{}\n", name, delimiter, value, delimiter));
    }
    append_file(path, &content)
}

fn append_file(path: &Path, content: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Workflow command line, e.g. `::error::message`
pub fn annotation(level: &str, message: &str) -> String {
    format!("::{}::{}", level, escape_data(message))
}

fn escape_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
