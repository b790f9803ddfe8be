use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {} seconds", .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Runs external programs with captured output and a hard timeout. The child
/// is killed if the timeout fires.
#[derive(Clone)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn execute<S: AsRef<OsStr>>(
        &self,
        program: &str,
        args: &[S],
        working_dir: Option<&Path>,
    ) -> Result<Output, CommandError> {
        let mut cmd = Command::new(program);
        cmd.args(args);

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            program = %program,
            args = ?args.iter().map(|a| a.as_ref().to_string_lossy()).collect::<Vec<_>>(),
            timeout_secs = %self.timeout.as_secs(),
            "Executing command"
        );

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| CommandError::TimedOut {
                program: program.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(
                program = %program,
                status = %output.status,
                stderr = %stderr,
                "Command failed"
            );
            return Err(CommandError::Failed {
                program: program.to_string(),
                status: output.status,
                stderr,
            });
        }

        tracing::debug!(
            program = %program,
            output_size = output.stdout.len(),
            "Command succeeded"
        );

        Ok(output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_of_successful_command() {
        let executor = CommandExecutor::new(Duration::from_secs(5));
        let output = executor
            .execute("sh", &["-c", "printf converted"], None)
            .await
            .unwrap();
        assert_eq!(output.stdout, b"converted");
    }

    #[tokio::test]
    async fn reports_stderr_on_failure() {
        let executor = CommandExecutor::new(Duration::from_secs(5));
        let err = executor
            .execute("sh", &["-c", "echo 'source file could not be loaded' >&2; exit 3"], None)
            .await
            .unwrap_err();
        match err {
            CommandError::Failed { stderr, status, .. } => {
                assert_eq!(stderr, "source file could not be loaded");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn times_out_long_running_command() {
        let executor = CommandExecutor::new(Duration::from_millis(100));
        let err = executor
            .execute("sh", &["-c", "sleep 5"], None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let executor = CommandExecutor::new(Duration::from_secs(1));
        let err = executor
            .execute::<&str>("definitely-not-an-office-suite", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }
}
