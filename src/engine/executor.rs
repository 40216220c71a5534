//! Command execution
//!
//! The engine only ever runs commands through [`CommandExecutor`]. The default
//! [`ShellExecutor`] hands the command string to a shell with the inherited
//! process environment plus an overlay. Each command gets its own process
//! group, and the whole group is killed once the deadline passes.

use crate::hooks::Vars;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::time::Instant;

/// Exit code reported when no status is available (killed, not started)
pub const UNKNOWN_EXIT_CODE: i32 = -1;

#[derive(Debug, Clone)]
pub struct CommandRequest<'a> {
    pub command: &'a str,
    pub env: &'a Vars,
    pub cwd: Option<&'a Path>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandFailure {
    ExitCode(i32),
    Signaled,
    TimedOut(Duration),
    Spawn(String),
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandFailure::ExitCode(code) => write!(f, "exit status {code}"),
            CommandFailure::Signaled => write!(f, "terminated by signal"),
            CommandFailure::TimedOut(timeout) => {
                write!(f, "timed out after {}s", timeout.as_secs())
            }
            CommandFailure::Spawn(err) => write!(f, "unable to start command: {err}"),
        }
    }
}

/// Combined stdout and stderr of a command with its exit code
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub output: Vec<u8>,
    pub exit_code: i32,
    pub failure: Option<CommandFailure>,
}

impl CommandOutput {
    pub fn success(output: Vec<u8>) -> Self {
        Self {
            output,
            exit_code: 0,
            failure: None,
        }
    }

    pub fn failed(output: Vec<u8>, exit_code: i32, failure: CommandFailure) -> Self {
        Self {
            output,
            exit_code,
            failure: Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run one command; failures are reported in the output, never dropped
    async fn execute(&self, request: CommandRequest<'_>) -> CommandOutput;
}

/// Runs commands as `<shell> -c <command>`
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
}

impl ShellExecutor {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new("/bin/sh")
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, request: CommandRequest<'_>) -> CommandOutput {
        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(request.command)
            .envs(request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        if let Some(dir) = request.cwd {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return CommandOutput::failed(
                    Vec::new(),
                    UNKNOWN_EXIT_CODE,
                    CommandFailure::Spawn(e.to_string()),
                );
            }
        };

        let deadline = Instant::now() + request.timeout;
        let (output, finished) =
            collect_output(child.stdout.take(), child.stderr.take(), deadline).await;

        let status = if finished {
            tokio::time::timeout_at(deadline, child.wait()).await.ok()
        } else {
            None
        };

        match status {
            Some(Ok(status)) if status.success() => CommandOutput::success(output),
            Some(Ok(status)) => match status.code() {
                Some(code) => CommandOutput::failed(output, code, CommandFailure::ExitCode(code)),
                None => CommandOutput::failed(output, UNKNOWN_EXIT_CODE, CommandFailure::Signaled),
            },
            Some(Err(e)) => CommandOutput::failed(
                output,
                UNKNOWN_EXIT_CODE,
                CommandFailure::Spawn(e.to_string()),
            ),
            None => {
                kill_process_group(&mut child);
                let _ = child.wait().await;
                CommandOutput::failed(
                    output,
                    UNKNOWN_EXIT_CODE,
                    CommandFailure::TimedOut(request.timeout),
                )
            }
        }
    }
}

/// Kill the shell and everything it started
#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            Ok(()) => {
                tracing::debug!(pid, "Killed process group of timed out command");
                return;
            }
            Err(e) => tracing::warn!(pid, error = %e, "Failed to kill process group, killing shell only"),
        }
    }
    if let Err(e) = child.start_kill() {
        tracing::debug!("Failed to kill timed out command: {}", e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::debug!("Failed to kill timed out command: {}", e);
    }
}

/// Read both pipes into one buffer in arrival order
///
/// Returns `false` when the deadline passed before both pipes closed.
async fn collect_output(
    mut stdout: Option<ChildStdout>,
    mut stderr: Option<ChildStderr>,
    deadline: Instant,
) -> (Vec<u8>, bool) {
    let mut output = Vec::new();
    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];
    let sleep = tokio::time::sleep_until(deadline);
    tokio::pin!(sleep);

    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            read = read_chunk(&mut stdout, &mut out_buf), if stdout.is_some() => match read {
                Some(n) => output.extend_from_slice(&out_buf[..n]),
                None => stdout = None,
            },
            read = read_chunk(&mut stderr, &mut err_buf), if stderr.is_some() => match read {
                Some(n) => output.extend_from_slice(&err_buf[..n]),
                None => stderr = None,
            },
            _ = &mut sleep => return (output, false),
        }
    }

    (output, true)
}

async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut Option<R>, buf: &mut [u8]) -> Option<usize> {
    let reader = reader.as_mut()?;
    match reader.read(buf).await {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request<'a>(command: &'a str, env: &'a Vars) -> CommandRequest<'a> {
        CommandRequest {
            command,
            env,
            cwd: None,
            timeout: Duration::from_secs(10),
        }
    }

    #[tokio::test]
    async fn test_captures_combined_output() {
        let env = Vars::new();
        let result = ShellExecutor::default()
            .execute(request("echo out; echo err 1>&2", &env))
            .await;

        assert!(result.is_success());
        assert_eq!(result.exit_code, 0);
        let text = result.text();
        assert!(text.contains("out"));
        assert!(text.contains("err"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_keeps_output() {
        let env = Vars::new();
        let result = ShellExecutor::default()
            .execute(request("echo partial; exit 3", &env))
            .await;

        assert_eq!(result.exit_code, 3);
        assert_eq!(result.failure, Some(CommandFailure::ExitCode(3)));
        assert_eq!(result.text(), "partial\n");
    }

    #[tokio::test]
    async fn test_environment_overlay() {
        let env: Vars = [("HOOKD_TEST_VALUE".to_string(), "overlay".to_string())]
            .into_iter()
            .collect();
        let result = ShellExecutor::default()
            .execute(request("printf %s \"$HOOKD_TEST_VALUE\"", &env))
            .await;

        assert_eq!(result.text(), "overlay");
    }

    #[tokio::test]
    async fn test_working_directory() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("marker"), "").unwrap();
        let env = Vars::new();
        let result = ShellExecutor::default()
            .execute(CommandRequest {
                cwd: Some(temp_dir.path()),
                ..request("test -f marker", &env)
            })
            .await;

        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_missing_working_directory_fails_to_start() {
        let env = Vars::new();
        let result = ShellExecutor::default()
            .execute(CommandRequest {
                cwd: Some(Path::new("/nonexistent/hookd/dir")),
                ..request("true", &env)
            })
            .await;

        assert_eq!(result.exit_code, UNKNOWN_EXIT_CODE);
        assert!(matches!(result.failure, Some(CommandFailure::Spawn(_))));
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let env = Vars::new();
        let started = std::time::Instant::now();
        let result = ShellExecutor::default()
            .execute(CommandRequest {
                timeout: Duration::from_millis(200),
                ..request("echo before; exec sleep 5", &env)
            })
            .await;

        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(result.exit_code, UNKNOWN_EXIT_CODE);
        assert!(matches!(result.failure, Some(CommandFailure::TimedOut(_))));
        assert_eq!(result.text(), "before\n");
    }

    #[tokio::test]
    async fn test_timeout_kills_subshells() {
        let temp_dir = TempDir::new().unwrap();
        let env = Vars::new();
        let result = ShellExecutor::default()
            .execute(CommandRequest {
                cwd: Some(temp_dir.path()),
                timeout: Duration::from_millis(200),
                ..request("(sleep 1; touch finished); echo unreachable", &env)
            })
            .await;

        assert!(matches!(result.failure, Some(CommandFailure::TimedOut(_))));
        assert!(!result.text().contains("unreachable"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!temp_dir.path().join("finished").exists());
    }

    #[tokio::test]
    async fn test_timeout_kills_background_jobs() {
        let temp_dir = TempDir::new().unwrap();
        let env = Vars::new();
        let result = ShellExecutor::default()
            .execute(CommandRequest {
                cwd: Some(temp_dir.path()),
                timeout: Duration::from_millis(200),
                ..request("(sleep 1; touch finished) & wait", &env)
            })
            .await;

        assert!(matches!(result.failure, Some(CommandFailure::TimedOut(_))));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!temp_dir.path().join("finished").exists());
    }
}
