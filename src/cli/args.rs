//! Command line arguments for quorumci.
//!
//! Every job input is also read from the CI host's `INPUT_<NAME>`
//! environment variable, so the same binary serves as an action entry point
//! and as a local CLI.

use crate::inputs::RawInputs;
use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Quorum-verified consistency checks for flaky external dependencies
#[derive(Parser, Debug)]
#[command(name = "quorumci")]
#[command(about = "Run a check N times and require R executions to agree on the result")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Inputs for the default `run` command
    #[command(flatten)]
    pub run: RunArgs,
}

impl Cli {
    /// The selected command; a bare invocation means `run`
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Run(self.run))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a job and evaluate the quorum (default)
    Run(RunArgs),
    /// List the job types and their inputs
    List,
    /// Print version and build information
    Version,
}

/// Report format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Text,
    /// The full quorum result as JSON
    Json,
    /// The Markdown summary document
    Markdown,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub inputs: JobInputs,

    /// Run executions concurrently instead of one after another
    #[arg(long, env = "INPUT_PARALLEL", value_parser = FalseyValueParser::new())]
    pub parallel: bool,

    /// Maximum executions in flight with --parallel
    #[arg(long, default_value_t = 4)]
    pub max_parallel: usize,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Show debug logging and full hashes
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only report executions that did not succeed
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", value_parser = FalseyValueParser::new())]
    pub no_color: bool,
}

/// Raw job inputs, named as in the action metadata
#[derive(Args, Debug, Clone, Default)]
pub struct JobInputs {
    /// Job type: http, webhook, script, dns or tls
    #[arg(long = "type", env = "INPUT_TYPE")]
    pub job_type: Option<String>,

    /// Target URL (http)
    #[arg(long, env = "INPUT_URL")]
    pub url: Option<String>,

    /// HTTP method (http)
    #[arg(long, env = "INPUT_METHOD", default_value = "GET")]
    pub method: Option<String>,

    /// Request headers as a JSON object (http, webhook)
    #[arg(long, env = "INPUT_HEADERS")]
    pub headers: Option<String>,

    /// Request body (http)
    #[arg(long, env = "INPUT_BODY")]
    pub body: Option<String>,

    /// Acceptable status code or comma-separated codes (http, webhook)
    #[arg(long, env = "INPUT_EXPECTED-STATUS", default_value = "200")]
    pub expected_status: Option<String>,

    /// Webhook endpoint URL (webhook)
    #[arg(long, env = "INPUT_ENDPOINT")]
    pub endpoint: Option<String>,

    /// JSON payload to POST (webhook)
    #[arg(long, env = "INPUT_PAYLOAD")]
    pub payload: Option<String>,

    /// Inline script source (script)
    #[arg(long, env = "INPUT_SCRIPT")]
    pub script: Option<String>,

    /// Path to a script file, used when no inline script is given (script)
    #[arg(long, env = "INPUT_SCRIPT-FILE")]
    pub script_file: Option<String>,

    /// Script runtime: node or bash (script)
    #[arg(long, env = "INPUT_RUNTIME")]
    pub runtime: Option<String>,

    /// Comma-separated script arguments (script)
    #[arg(long, env = "INPUT_SCRIPT-ARGS")]
    pub script_args: Option<String>,

    /// Script environment as a JSON object (script)
    #[arg(long, env = "INPUT_SCRIPT-ENV")]
    pub script_env: Option<String>,

    /// Host to resolve or probe (dns, tls)
    #[arg(long, env = "INPUT_HOSTNAME")]
    pub hostname: Option<String>,

    /// Record type: A, AAAA, CNAME, MX, TXT, NS, SOA or PTR (dns)
    #[arg(long, env = "INPUT_RECORD-TYPE")]
    pub record_type: Option<String>,

    /// Comma-separated expected record values (dns)
    #[arg(long, env = "INPUT_EXPECTED-VALUES")]
    pub expected_values: Option<String>,

    /// Nameserver IP or IP:port (dns)
    #[arg(long, env = "INPUT_NAMESERVER")]
    pub nameserver: Option<String>,

    /// Port to connect to, default 443 (tls)
    #[arg(long, env = "INPUT_PORT")]
    pub port: Option<String>,

    /// Minimum days of remaining certificate validity (tls)
    #[arg(long, env = "INPUT_MIN-DAYS-VALID")]
    pub min_days_valid: Option<String>,

    /// Expected certificate issuer (tls)
    #[arg(long, env = "INPUT_EXPECTED-ISSUER")]
    pub expected_issuer: Option<String>,

    /// Number of executions
    #[arg(long, env = "INPUT_EXECUTIONS", default_value = "3")]
    pub executions: Option<String>,

    /// Executions that must agree
    #[arg(long, env = "INPUT_QUORUM", default_value = "2")]
    pub quorum: Option<String>,

    /// Per-execution timeout in milliseconds
    #[arg(long, env = "INPUT_TIMEOUT-MS", default_value = "30000")]
    pub timeout_ms: Option<String>,
}

impl JobInputs {
    /// Collect the provided inputs into a raw input map
    pub fn to_raw_inputs(&self) -> RawInputs {
        let fields: [(&str, &Option<String>); 23] = [
            ("type", &self.job_type),
            ("url", &self.url),
            ("method", &self.method),
            ("headers", &self.headers),
            ("body", &self.body),
            ("expected-status", &self.expected_status),
            ("endpoint", &self.endpoint),
            ("payload", &self.payload),
            ("script", &self.script),
            ("script-file", &self.script_file),
            ("runtime", &self.runtime),
            ("script-args", &self.script_args),
            ("script-env", &self.script_env),
            ("hostname", &self.hostname),
            ("record-type", &self.record_type),
            ("expected-values", &self.expected_values),
            ("nameserver", &self.nameserver),
            ("port", &self.port),
            ("min-days-valid", &self.min_days_valid),
            ("expected-issuer", &self.expected_issuer),
            ("executions", &self.executions),
            ("quorum", &self.quorum),
            ("timeout-ms", &self.timeout_ms),
        ];

        fields
            .into_iter()
            .filter_map(|(name, value)| value.as_ref().map(|v| (name, v.clone())))
            .collect()
    }
}

/// Description of each job type's inputs, for `quorumci list`
pub const JOB_TYPE_HELP: &[(&str, &str, &str)] = &[
    ("http", "url, method", "headers, body, expected-status"),
    ("webhook", "endpoint", "payload, headers, expected-status"),
    ("script", "script | script-file", "runtime, script-args, script-env"),
    ("dns", "hostname", "record-type, expected-values, nameserver"),
    ("tls", "hostname", "port, min-days-valid, expected-issuer"),
];
