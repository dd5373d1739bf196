//! Script job runner.
//!
//! Runs the script with the configured interpreter:
//! - node: `node -e <script> <args...>`
//! - bash: `bash -c <script> quorumci <args...>` (args land in `$1..`)
//!
//! Exit code 0 is success. The digest covers stdout only, so scripts that
//! print diagnostic noise to stderr still agree on their output.

use super::{elapsed_ms, hash_content, truncate_message, ExecutionContext, JobRunner, ScriptJobConfig, ScriptRuntime};
use crate::engine::result::{ExecutionResult, ExecutionStatus};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const MAX_STDERR_CHARS: usize = 500;

pub struct ScriptJobRunner {
    config: ScriptJobConfig,
}

impl ScriptJobRunner {
    pub fn new(config: ScriptJobConfig) -> Self {
        ScriptJobRunner { config }
    }

    fn command(&self) -> Command {
        let runtime = self.config.runtime;
        let mut command = Command::new(runtime.program());

        match runtime {
            ScriptRuntime::Node => {
                command.arg("-e").arg(&self.config.script);
            }
            ScriptRuntime::Bash => {
                command.arg("-c").arg(&self.config.script).arg("quorumci");
            }
        }

        if let Some(ref args) = self.config.args {
            command.args(args);
        }
        if let Some(ref env) = self.config.env {
            command.envs(env);
        }

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl JobRunner for ScriptJobRunner {
    fn describe(&self) -> String {
        format!("script executions with {} runtime", self.config.runtime)
    }

    fn execute(&self, context: &ExecutionContext) -> ExecutionResult {
        let start = Instant::now();
        let deadline = Duration::from_millis(self.config.timeout_ms);
        let id = context.processor_id.as_str();

        let mut child = match self.command().spawn() {
            Ok(child) => child,
            Err(e) => {
                return ExecutionResult::new(id, ExecutionStatus::Error, elapsed_ms(start))
                    .with_error(format!("Failed to start {}: {}", self.config.runtime, e));
            }
        };

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match wait_with_deadline(&mut child, start, deadline) {
            Ok(Some(status)) => status,
            Ok(None) => {
                // Reader threads are left to finish once the pipes close
                return ExecutionResult::new(id, ExecutionStatus::Timeout, elapsed_ms(start))
                    .with_error(format!("Script timed out after {}ms", self.config.timeout_ms));
            }
            Err(e) => {
                return ExecutionResult::new(id, ExecutionStatus::Error, elapsed_ms(start))
                    .with_error(format!("Failed to wait for script: {}", e));
            }
        };

        // A background process that inherited stdout keeps the pipe open past
        // the script's own exit; without the full output there is nothing to hash
        let Some(stdout) = collect(stdout, start, deadline) else {
            return ExecutionResult::new(id, ExecutionStatus::Timeout, elapsed_ms(start)).with_error(format!(
                "Script output not closed within {}ms",
                self.config.timeout_ms
            ));
        };
        let stderr = collect(stderr, start, deadline).unwrap_or_default();
        let latency_ms = elapsed_ms(start);

        debug!(processor_id = id, exit = ?status.code(), latency_ms, "Script finished");

        match status.code() {
            Some(0) => ExecutionResult::new(id, ExecutionStatus::Success, latency_ms)
                .with_status_code(0)
                .with_hash(hash_content(&stdout)),
            Some(code) => {
                let stderr_text = String::from_utf8_lossy(&stderr);
                let mut message = format!("Script exited with code {}", code);
                if !stderr_text.trim().is_empty() {
                    message.push_str(": ");
                    message.push_str(&truncate_message(&stderr_text, MAX_STDERR_CHARS));
                }
                ExecutionResult::new(id, ExecutionStatus::Failure, latency_ms)
                    .with_status_code(code)
                    .with_hash(hash_content(&stdout))
                    .with_error(message)
            }
            None => ExecutionResult::new(id, ExecutionStatus::Error, latency_ms)
                .with_error("Script terminated by signal"),
        }
    }
}

/// Read a pipe to the end on a background thread
fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            debug!(error = %e, "Script pipe read ended early");
        }
        let _ = tx.send(buf);
    });
    rx
}

/// Wait for exit, killing the child once the deadline passes.
///
/// Returns `Ok(None)` when the child was killed.
fn wait_with_deadline(
    child: &mut Child,
    start: Instant,
    deadline: Duration,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= deadline {
            if let Err(e) = child.kill() {
                warn!(error = %e, "Failed to kill timed out script");
            }
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Wait for a drained pipe until the deadline.
///
/// Returns `None` when the pipe is still open at the deadline.
fn collect(rx: Option<Receiver<Vec<u8>>>, start: Instant, deadline: Duration) -> Option<Vec<u8>> {
    let Some(rx) = rx else {
        return Some(Vec::new());
    };
    let remaining = deadline
        .checked_sub(start.elapsed())
        .unwrap_or(Duration::ZERO)
        .max(POLL_INTERVAL);
    match rx.recv_timeout(remaining) {
        Ok(output) => Some(output),
        Err(e) => {
            debug!(error = %e, "Script output pipe still open at deadline");
            None
        }
    }
}
