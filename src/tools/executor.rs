//! Bounded Process Executor
//!
//! Runs an approved [`SafeCommand`] as a child process under a hard deadline
//! and normalises the outcome into tool text or a [`GatewayError`].
//!
//! By default the command line is split into argv and the binary is spawned
//! directly, so shell metacharacters are never interpreted. `ShellMode::Shell`
//! hands the line to `sh -c` instead and is opt-in.

use super::error::GatewayError;
use super::timeout::ExecutionTimeout;
use super::validator::SafeCommand;
use crate::metrics;
use crate::policy::CommandFamily;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

/// Maximum captured bytes per stream (1 MiB)
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// How the approved command line reaches the operating system
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellMode {
    /// Split into argv and spawn the binary directly
    #[default]
    Direct,
    /// `sh -c "<binary> <command line>"`
    Shell,
}

/// Raw outcome of one child process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,

    /// None if the process was killed by a signal or timed out
    pub exit_code: Option<i32>,

    pub duration_ms: f64,
    pub timed_out: bool,
}

impl ExecutionResult {
    fn finished(status: ExitStatus, stdout: String, stderr: String, duration_ms: f64) -> Self {
        Self {
            success: status.success(),
            stdout,
            stderr,
            exit_code: status.code(),
            duration_ms,
            timed_out: false,
        }
    }

    fn timeout(duration_ms: f64) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            duration_ms,
            timed_out: true,
        }
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        if self.timed_out {
            format!("Timeout after {:.0}ms", self.duration_ms)
        } else if self.success {
            format!(
                "Success (exit code: {:?}, {:.0}ms, {} bytes output)",
                self.exit_code,
                self.duration_ms,
                self.stdout.len()
            )
        } else {
            format!(
                "Failed (exit code: {:?}, {:.0}ms, {} bytes output)",
                self.exit_code,
                self.duration_ms,
                self.stdout.len() + self.stderr.len()
            )
        }
    }
}

/// Configuration for process execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Per-stream capture limit; excess output is drained and discarded
    pub max_output_size: usize,

    /// Surface stderr as the tool result when a command exits non-zero
    pub return_err_output: bool,

    /// Trim surrounding whitespace from successful output
    pub strip_newlines: bool,

    pub shell_mode: ShellMode,

    /// Binary path overrides; families not listed use their canonical name
    pub binaries: HashMap<CommandFamily, String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_output_size: MAX_OUTPUT_SIZE,
            return_err_output: true,
            strip_newlines: false,
            shell_mode: ShellMode::Direct,
            binaries: HashMap::new(),
        }
    }
}

impl ExecutorConfig {
    pub fn max_output_size(mut self, size: usize) -> Self {
        self.max_output_size = size;
        self
    }

    pub fn return_err_output(mut self, enabled: bool) -> Self {
        self.return_err_output = enabled;
        self
    }

    pub fn strip_newlines(mut self, enabled: bool) -> Self {
        self.strip_newlines = enabled;
        self
    }

    pub fn shell_mode(mut self, mode: ShellMode) -> Self {
        self.shell_mode = mode;
        self
    }

    pub fn binary(mut self, family: CommandFamily, path: impl Into<String>) -> Self {
        self.binaries.insert(family, path.into());
        self
    }

    /// Configured binary for a family
    pub fn binary_for(&self, family: CommandFamily) -> &str {
        self.binaries
            .get(&family)
            .map(String::as_str)
            .unwrap_or_else(|| family.binary_name())
    }
}

/// Spawns exactly one child per approved command
///
/// The deadline comes from the access policy and bounds every invocation.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    config: ExecutorConfig,
    timeout: ExecutionTimeout,
}

impl ProcessExecutor {
    pub fn new(config: ExecutorConfig, timeout: ExecutionTimeout) -> Self {
        Self { config, timeout }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn timeout(&self) -> ExecutionTimeout {
        self.timeout
    }

    /// Run an approved command and normalise its outcome
    ///
    /// Non-zero exits with diagnostic output on stderr are returned as text
    /// when `return_err_output` is set.
    pub async fn run(&self, command: &SafeCommand) -> Result<String, GatewayError> {
        let family = command.family();
        let (program, args) = self.program_and_args(command)?;

        info!(family = %family, command = %command.command_line(), "Executing command");
        let result = self.execute(&program, &args).await?;
        debug!(family = %family, "{}", result.summary());

        metrics::observe_command_duration(family.binary_name(), result.duration_ms / 1000.0);
        if result.timed_out {
            metrics::record_timeout(family.binary_name());
        }

        self.normalize(result)
    }

    fn program_and_args(&self, command: &SafeCommand) -> Result<(String, Vec<String>), GatewayError> {
        let family = command.family();
        let binary = self.config.binary_for(family);
        let argv = command.argv();
        let tail = match argv.first() {
            Some(first) if first == family.binary_name() => &argv[1..],
            _ => argv,
        };

        match self.config.shell_mode {
            ShellMode::Direct => Ok((binary.to_string(), tail.to_vec())),
            ShellMode::Shell => {
                let quoted = shlex::try_join(std::iter::once(binary).chain(tail.iter().map(String::as_str)))
                    .map_err(|e| GatewayError::ProcessFailed(format!("cannot quote command: {}", e)))?;
                Ok(("sh".to_string(), vec!["-c".to_string(), quoted]))
            }
        }
    }

    async fn execute(&self, program: &str, args: &[String]) -> Result<ExecutionResult, GatewayError> {
        let start = Instant::now();

        let mut child = TokioCommand::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GatewayError::ProcessFailed(format!("failed to spawn {}: {}", program, e)))?;

        let limit = self.config.max_output_size;
        let stdout_task = child.stdout.take().map(|out| tokio::spawn(read_capped(out, limit)));
        let stderr_task = child.stderr.take().map(|err| tokio::spawn(read_capped(err, limit)));
        let aborts: Vec<_> = stdout_task
            .iter()
            .chain(stderr_task.iter())
            .map(|task| task.abort_handle())
            .collect();

        let waited = self
            .timeout
            .run(async {
                let status = child.wait().await;
                let stdout = join_output(stdout_task).await;
                let stderr = join_output(stderr_task).await;
                (status, stdout, stderr)
            })
            .await;

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        match waited {
            Ok((status, stdout, stderr)) => {
                let status = status
                    .map_err(|e| GatewayError::ProcessFailed(format!("failed to wait for {}: {}", program, e)))?;
                Ok(ExecutionResult::finished(status, stdout, stderr, duration_ms))
            }
            Err(_) => {
                warn!(program, timeout = ?self.timeout.duration(), "Command timed out, killing process");
                if let Err(e) = child.kill().await {
                    warn!(program, "Failed to kill timed out process: {}", e);
                }
                for abort in aborts {
                    abort.abort();
                }
                Ok(ExecutionResult::timeout(duration_ms))
            }
        }
    }

    fn normalize(&self, result: ExecutionResult) -> Result<String, GatewayError> {
        if result.timed_out {
            return Err(GatewayError::TimedOut {
                after_secs: self.timeout.as_secs(),
            });
        }

        if result.success {
            return Ok(if self.config.strip_newlines {
                result.stdout.trim().to_string()
            } else {
                result.stdout
            });
        }

        let stderr = result.stderr.trim();
        if self.config.return_err_output && !stderr.is_empty() {
            return Ok(result.stderr);
        }

        let status = match result.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        Err(GatewayError::ProcessFailed(if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, stderr)
        }))
    }
}

async fn join_output(task: Option<tokio::task::JoinHandle<String>>) -> String {
    match task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    }
}

/// Read a stream to the end, keeping at most `limit` bytes
async fn read_capped<R>(mut reader: R, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut buf = [0u8; 8192];
    let mut overflowed = false;
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = limit.saturating_sub(kept.len());
                if n > room {
                    overflowed = true;
                }
                kept.extend_from_slice(&buf[..n.min(room)]);
            }
        }
    }
    let text = String::from_utf8_lossy(&kept).into_owned();
    if overflowed {
        truncate_string(text + "...", limit)
    } else {
        text
    }
}

/// Truncate a string to a maximum length, adding ellipsis if truncated
fn truncate_string(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len.saturating_sub(3);
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("...");
    }
    s
}
