//! Child process management for stdio servers
//!
//! An MCP server reached over stdio is just a program we launch: requests go
//! to its stdin, responses come back on its stdout, and whatever it writes to
//! stderr is diagnostic output that we forward to `tracing`.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::{ClientError, ClientResult};

/// Program and arguments used to launch a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    /// Program to execute
    pub program: String,
    /// Arguments to pass to the program
    pub args: Vec<String>,
}

impl ServerCommand {
    /// Parse a connection target
    ///
    /// The target is split on whitespace. A lone `*.js` or `*.py` script is
    /// launched through `node` or the Python interpreter; anything else is
    /// taken as `program arg...`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidCommand`] for an empty target.
    pub fn parse(target: &str) -> ClientResult<Self> {
        let parts: Vec<&str> = target.split_whitespace().collect();
        let Some((first, rest)) = parts.split_first() else {
            return Err(ClientError::InvalidCommand(
                "No command specified for the server".to_string(),
            ));
        };

        if rest.is_empty() {
            if first.ends_with(".js") {
                return Ok(Self::interpreted("node", first));
            }
            if first.ends_with(".py") {
                return Ok(Self::interpreted(python_interpreter(), first));
            }
        }

        Ok(Self {
            program: (*first).to_string(),
            args: rest.iter().map(|s| (*s).to_string()).collect(),
        })
    }

    fn interpreted(interpreter: &str, script: &str) -> Self {
        Self {
            program: interpreter.to_string(),
            args: vec![script.to_string()],
        }
    }
}

impl std::fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

fn python_interpreter() -> &'static str {
    if cfg!(windows) { "python" } else { "python3" }
}

/// Configuration for a server child process
#[derive(Debug, Clone)]
pub struct ChildProcessConfig {
    /// What to run
    pub command: ServerCommand,

    /// Working directory for the process
    pub working_directory: Option<String>,

    /// Extra environment variables
    pub environment: Vec<(String, String)>,

    /// How long to wait for the process to exit after the kill signal
    pub shutdown_timeout: Duration,

    /// Whether to kill the process when the handle is dropped
    pub kill_on_drop: bool,
}

impl ChildProcessConfig {
    /// Config with defaults for the given command
    pub fn new(command: ServerCommand) -> Self {
        Self {
            command,
            working_directory: None,
            environment: Vec::new(),
            shutdown_timeout: Duration::from_secs(5),
            kill_on_drop: true,
        }
    }
}

/// A running server process
///
/// `spawn` hands the stdio pipes to the caller; the handle keeps the process
/// itself and the stderr drain task.
#[derive(Debug)]
pub struct ChildProcess {
    config: ChildProcessConfig,
    child: Option<Child>,
    stderr_task: Option<JoinHandle<()>>,
}

impl ChildProcess {
    /// Start the process with piped stdio
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectionFailed`] if the program cannot be
    /// spawned or its pipes are unavailable.
    pub fn spawn(config: ChildProcessConfig) -> ClientResult<(Self, ChildStdin, ChildStdout)> {
        info!("Starting server process: {}", config.command);

        let mut cmd = Command::new(&config.command.program);
        cmd.args(&config.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(config.kill_on_drop);

        if let Some(ref wd) = config.working_directory {
            cmd.current_dir(wd);
        }
        for (key, value) in &config.environment {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            error!("Failed to spawn server process: {}", e);
            ClientError::ConnectionFailed(format!(
                "Failed to start '{}': {e}",
                config.command.program
            ))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            ClientError::ConnectionFailed("Failed to get stdin handle".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            ClientError::ConnectionFailed("Failed to get stdout handle".to_string())
        })?;

        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "toolpilot::server", "stderr: {}", line);
                }
                debug!("STDERR reader task completed");
            })
        });

        let process = Self {
            config,
            child: Some(child),
            stderr_task,
        };
        Ok((process, stdin, stdout))
    }

    /// OS process id, while running
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Whether the process is still running
    pub fn is_alive(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Stop the process; calling it again is a no-op
    ///
    /// # Errors
    ///
    /// Currently infallible; failures to signal or reap the process are logged.
    pub async fn stop(&mut self) -> ClientResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        info!("Stopping server process");

        if let Err(e) = child.start_kill() {
            warn!("Failed to send kill signal to server process: {}", e);
        }

        match timeout(self.config.shutdown_timeout, child.wait()).await {
            Ok(Ok(status)) => info!("Server process exited with status: {}", status),
            Ok(Err(e)) => error!("Failed to wait for server process exit: {}", e),
            Err(_) => {
                warn!("Server process shutdown timed out, forcing kill");
                if let Err(e) = child.kill().await {
                    error!("Failed to force kill server process: {}", e);
                }
            }
        }

        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        Ok(())
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if self.config.kill_on_drop
            && let Some(child) = self.child.as_mut()
        {
            let _ = child.start_kill();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}
