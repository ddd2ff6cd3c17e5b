//! External command execution
//!
//! Commands run through the configured shell with stdin closed and both output pipes
//! drained concurrently. The call returns when the process exits, the timeout elapses,
//! or the combined output passes the byte cap. In the last two cases the child is
//! killed. There is no other cancellation path.

use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::ExecutorConfig;
use crate::errors::ExecError;

const READ_CHUNK_SIZE: usize = 8192;

/// Captured result of a finished process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Trimmed stdout and stderr, newline-joined when both are present
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (false, false) => format!("{}\n{}", stdout, stderr),
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (true, true) => String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandExecutor {
    shell: String,
    shell_arg: String,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(&ExecutorConfig::default())
    }
}

impl CommandExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            shell: config.shell.clone(),
            shell_arg: config.shell_arg.clone(),
        }
    }

    /// Run `command` and wait for it within `timeout`
    pub async fn run(
        &self,
        command: &str,
        timeout: Duration,
        max_output_bytes: usize,
    ) -> Result<CommandOutput, ExecError> {
        let start = Instant::now();
        debug!(command, timeout_ms = timeout.as_millis() as u64, "Spawning command");

        let mut child = Command::new(&self.shell)
            .arg(&self.shell_arg)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ExecError::Spawn)?;

        let stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| ExecError::Io(std::io::Error::other("stdout pipe unavailable")))?;
        let stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| ExecError::Io(std::io::Error::other("stderr pipe unavailable")))?;

        let total = AtomicUsize::new(0);
        let outcome = tokio::time::timeout(timeout, async {
            let (stdout, stderr) = tokio::try_join!(
                read_capped(stdout_pipe, &total, max_output_bytes),
                read_capped(stderr_pipe, &total, max_output_bytes),
            )?;
            let status = child.wait().await.map_err(ExecError::Io)?;
            Ok::<_, ExecError>((status, stdout, stderr))
        })
        .await;

        let (status, stdout, stderr) = match outcome {
            Ok(Ok(collected)) => collected,
            Ok(Err(error)) => {
                warn!(command, %error, "Command aborted");
                let _ = child.kill().await;
                return Err(error);
            }
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                warn!(command, timeout_ms, "Command timed out");
                let _ = child.kill().await;
                return Err(ExecError::Timeout { timeout_ms });
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let output = CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: status.code(),
            success: status.success(),
            duration_ms,
        };

        if output.success {
            debug!(command, duration_ms, "Command completed");
        } else {
            warn!(command, exit_code = ?output.exit_code, duration_ms, "Command failed");
        }

        Ok(output)
    }
}

/// Read a pipe to EOF, failing once the bytes read across all pipes exceed `limit`
async fn read_capped<R: AsyncRead + Unpin>(
    mut reader: R,
    total: &AtomicUsize,
    limit: usize,
) -> Result<Vec<u8>, ExecError> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let n = reader.read(&mut chunk).await.map_err(ExecError::Io)?;
        if n == 0 {
            break;
        }
        let seen = total.fetch_add(n, Ordering::Relaxed) + n;
        if seen > limit {
            return Err(ExecError::OutputOverflow { limit });
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Ok(buf)
}
