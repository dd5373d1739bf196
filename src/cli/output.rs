//! Output formatting for quorumci.
//!
//! Provides terminal, JSON, and Markdown output formatters.
//!
//! # Graceful Degradation
//!
//! This module handles errors gracefully:
//! - Non-TTY output: Color disabled via NO_COLOR or --no-color
//! - Missing status codes or hashes: Rendered as "-"
//! - Table-breaking characters in values: Escaped in Markdown cells
//! - Empty execution lists: Produces valid output with zero rows
//!
//! All formatters produce valid output for any QuorumResult input.
//! No function in this module will panic.

use crate::cli::args::OutputFormat;
use crate::engine::result::{ExecutionResult, ExecutionStatus, QuorumResult, Verdict};
use crate::jobs::JobConfig;

const RULE: &str = "--------------------------------------------------------------------------------";

/// Consensus hash characters shown in summaries
pub const CONSENSUS_HASH_PREFIX: usize = 16;
/// Per-execution hash characters shown in tables
pub const EXECUTION_HASH_PREFIX: usize = 8;

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format a quorum result for the job that produced it
    fn format(&self, result: &QuorumResult, job: &JobConfig) -> String;
}

/// One-line outcome, e.g. "Quorum PASSED: 3/3 agreed"
pub fn verdict_line(result: &QuorumResult) -> String {
    match result.verdict {
        Verdict::Pass => format!(
            "Quorum PASSED: {}/{} agreed",
            result.agreement_count, result.total_executions
        ),
        Verdict::Fail => format!(
            "Quorum FAILED: {}/{} agreed (required: {})",
            result.agreement_count, result.total_executions, result.required_agreement
        ),
    }
}

/// First `len` characters of a hash
pub fn short_hash(hash: &str, len: usize) -> &str {
    hash.get(..len).unwrap_or(hash)
}

/// Terminal (human-readable) formatter
pub struct TerminalFormatter {
    color: bool,
    verbose: bool,
    quiet: bool,
}

impl TerminalFormatter {
    pub fn new(color: bool, verbose: bool, quiet: bool) -> Self {
        TerminalFormatter {
            color,
            verbose,
            quiet,
        }
    }

    fn colorize(&self, text: &str, color_code: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", color_code, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.colorize(text, "32")
    }

    fn yellow(&self, text: &str) -> String {
        self.colorize(text, "33")
    }

    fn red(&self, text: &str) -> String {
        self.colorize(text, "31")
    }

    fn gray(&self, text: &str) -> String {
        self.colorize(text, "90")
    }

    fn status_tag(&self, status: ExecutionStatus) -> String {
        match status {
            ExecutionStatus::Success => self.green("[OK]  "),
            ExecutionStatus::Failure => self.red("[FAIL]"),
            ExecutionStatus::Timeout => self.yellow("[TIME]"),
            ExecutionStatus::Error => self.gray("[ERR] "),
        }
    }

    fn execution_line(&self, execution: &ExecutionResult) -> String {
        let mut line = format!(
            "  {} {}: {}",
            self.status_tag(execution.status),
            execution.processor_id,
            execution.status
        );

        if let Some(code) = execution.status_code {
            line.push_str(&format!(" {}", code));
        }
        line.push_str(&format!(" ({}ms)", execution.latency_ms));

        if let Some(ref hash) = execution.response_hash {
            let shown = if self.verbose {
                hash.as_str()
            } else {
                short_hash(hash, EXECUTION_HASH_PREFIX)
            };
            line.push_str(&format!(" {}", self.gray(shown)));
        }
        if let Some(ref error) = execution.error {
            line.push_str(&format!(" - {}", error));
        }

        line
    }
}

impl OutputFormatter for TerminalFormatter {
    fn format(&self, result: &QuorumResult, job: &JobConfig) -> String {
        let mut output = String::new();

        // Header
        output.push_str(RULE);
        output.push('\n');
        output.push_str("quorumci quorum report\n");
        output.push_str(&format!("Job: {}\n", result.job_id));
        for (setting, value) in job.settings() {
            output.push_str(&format!("{}: {}\n", setting, value));
        }
        output.push_str(RULE);
        output.push_str("\n\n");

        // Executions
        output.push_str("EXECUTIONS\n");
        let shown: Vec<&ExecutionResult> = result
            .executions
            .iter()
            .filter(|e| !self.quiet || !e.is_success())
            .collect();
        if shown.is_empty() {
            output.push_str(&format!("  {}\n", self.gray("(all executions succeeded)")));
        }
        for execution in shown {
            output.push_str(&self.execution_line(execution));
            output.push('\n');
        }
        output.push('\n');

        // Summary
        let summary = result.summary();
        output.push_str(RULE);
        output.push('\n');
        output.push_str(&format!(
            "SUMMARY: {} succeeded, {} failed, {} timed out, {} errored\n",
            summary.succeeded, summary.failed, summary.timed_out, summary.errored
        ));
        if let Some(ref hash) = result.consensus_hash {
            let shown = if self.verbose {
                hash.as_str()
            } else {
                short_hash(hash, CONSENSUS_HASH_PREFIX)
            };
            output.push_str(&format!("Consensus hash: {}\n", shown));
        }
        output.push_str(&format!("Total time: {:.1}s\n", result.duration_ms as f64 / 1000.0));

        let line = verdict_line(result);
        let verdict = if result.is_pass() {
            self.green(&line)
        } else {
            self.red(&line)
        };
        output.push_str(&verdict);
        output.push('\n');
        output.push_str(RULE);

        output
    }
}

/// JSON formatter
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        JsonFormatter { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, result: &QuorumResult, _job: &JobConfig) -> String {
        let encoded = if self.pretty {
            serde_json::to_string_pretty(result)
        } else {
            serde_json::to_string(result)
        };
        // Plain data with string keys always serializes
        encoded.unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }
}

/// Markdown summary formatter, used for the CI step summary
#[derive(Default)]
pub struct MarkdownFormatter;

impl MarkdownFormatter {
    pub fn new() -> Self {
        MarkdownFormatter
    }

    fn table(header: [&str; 2], rows: &[(String, String)]) -> String {
        let mut table = format!("| {} | {} |\n| --- | --- |\n", header[0], header[1]);
        for (key, value) in rows {
            table.push_str(&format!("| {} | {} |\n", escape_cell(key), escape_cell(value)));
        }
        table
    }

    fn status_marker(status: ExecutionStatus) -> &'static str {
        match status {
            ExecutionStatus::Success => "🟢",
            ExecutionStatus::Failure => "🔴",
            ExecutionStatus::Timeout => "🟡",
            ExecutionStatus::Error => "⚪",
        }
    }
}

impl OutputFormatter for MarkdownFormatter {
    fn format(&self, result: &QuorumResult, job: &JobConfig) -> String {
        let mut output = String::new();

        let marker = if result.is_pass() { "✅" } else { "❌" };
        output.push_str(&format!(
            "## {} Quorum {}\n\n",
            marker,
            result.verdict.to_string().to_uppercase()
        ));

        let mut metrics = vec![
            (
                "Agreement".to_string(),
                format!("{}/{}", result.agreement_count, result.total_executions),
            ),
            ("Required".to_string(), result.required_agreement.to_string()),
            (
                "Quorum Met".to_string(),
                if result.quorum_met { "Yes" } else { "No" }.to_string(),
            ),
            ("Duration".to_string(), format!("{}ms", result.duration_ms)),
        ];
        if let Some(ref hash) = result.consensus_hash {
            metrics.push((
                "Consensus Hash".to_string(),
                format!("`{}...`", short_hash(hash, CONSENSUS_HASH_PREFIX)),
            ));
        }
        output.push_str(&Self::table(["Metric", "Value"], &metrics));

        output.push_str("\n### Configuration\n\n");
        let settings: Vec<(String, String)> = job
            .settings()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        output.push_str(&Self::table(["Setting", "Value"], &settings));

        output.push_str("\n### Executions\n\n");
        output.push_str("| Processor | Status | Code | Latency | Hash |\n");
        output.push_str("| --- | --- | --- | --- | --- |\n");
        for execution in &result.executions {
            let code = execution
                .status_code
                .map_or_else(|| "-".to_string(), |c| c.to_string());
            let hash = execution
                .response_hash
                .as_deref()
                .map_or_else(|| "-".to_string(), |h| format!("`{}`", short_hash(h, EXECUTION_HASH_PREFIX)));
            output.push_str(&format!(
                "| {} | {} {} | {} | {}ms | {} |\n",
                escape_cell(&execution.processor_id),
                Self::status_marker(execution.status),
                execution.status,
                code,
                execution.latency_ms,
                hash
            ));
        }

        output
    }
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

/// Get a formatter based on the output format
pub fn get_formatter(
    format: OutputFormat,
    no_color: bool,
    verbose: bool,
    quiet: bool,
) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => Box::new(TerminalFormatter::new(!no_color, verbose, quiet)),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter::new()),
    }
}
