//! Shell execution of a target's run command.

use shipwright_core::ports::RunReport;
use shipwright_core::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How long output is still forwarded once the shell has exited.
const OUTPUT_GRACE: Duration = Duration::from_millis(250);

/// One command invocation.
#[derive(Debug, Clone)]
pub struct ShellCommand<'a> {
    pub target: &'a str,
    pub shell: &'a str,
    pub command: &'a str,
    pub workdir: &'a Path,
    pub env: HashMap<String, String>,
}

/// Runs commands on the host, forwarding their output to the log.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }

    /// Execute a command. A non-zero exit is a [`Error::RunFailed`].
    ///
    /// The child is killed if the returned future is dropped, so an outer
    /// timeout terminates the process.
    pub async fn execute(&self, cmd: ShellCommand<'_>) -> Result<RunReport> {
        let start = std::time::Instant::now();

        info!(name = %cmd.target, command = %cmd.command, "Executing run command");

        let mut child = Command::new(cmd.shell)
            .arg("-c")
            .arg(cmd.command)
            .current_dir(cmd.workdir)
            .envs(&cmd.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::RunFailed {
                target: cmd.target.to_string(),
                message: format!("failed to spawn {}: {}", cmd.shell, e),
            })?;

        let stdout = child
            .stdout
            .take()
            .map(|out| tokio::spawn(forward_lines(out, cmd.target.to_string(), false)));
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(forward_lines(err, cmd.target.to_string(), true)));

        let status = child.wait().await.map_err(|e| Error::RunFailed {
            target: cmd.target.to_string(),
            message: format!("failed to wait for process: {}", e),
        })?;

        // Background children inherit the pipes and may keep them open long
        // after the shell itself has exited.
        for mut handle in [stdout, stderr].into_iter().flatten() {
            if tokio::time::timeout(OUTPUT_GRACE, &mut handle).await.is_err() {
                debug!(name = %cmd.target, "Output still open after exit, detaching");
                handle.abort();
            }
        }

        let exit_code = status.code().unwrap_or(-1);
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(name = %cmd.target, exit_code, duration_ms, "Command completed");

        if !status.success() {
            return Err(Error::RunFailed {
                target: cmd.target.to_string(),
                message: format!("exit code {}", exit_code),
            });
        }

        Ok(RunReport {
            exit_code,
            duration_ms,
        })
    }
}

async fn forward_lines<R>(reader: R, target: String, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr {
            warn!(name = %target, "{}", line);
        } else {
            info!(name = %target, "{}", line);
        }
    }
}
