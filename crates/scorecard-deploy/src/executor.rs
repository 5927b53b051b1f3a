//! Running pipeline steps as child processes.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{DeployError, DeployResult};
use crate::plan::{Stage, Step};

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl StepOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a single step.
///
/// A non-zero exit is returned as output, not as an error; the pipeline
/// decides what that means. Errors are reserved for steps that could not
/// run to completion.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, step: &Step, cancel: watch::Receiver<bool>) -> DeployResult<StepOutput>;
}

/// Executes steps with `tokio::process`.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    work_dir: PathBuf,
    timeout: Duration,
}

impl ProcessExecutor {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            timeout: Duration::from_secs(1800),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl StepExecutor for ProcessExecutor {
    async fn execute(&self, step: &Step, mut cancel: watch::Receiver<bool>) -> DeployResult<StepOutput> {
        if *cancel.borrow() {
            return Err(DeployError::Cancelled);
        }

        info!(stage = %step.stage, "$ {}", step.command_line());

        let mut child = Command::new(&step.program)
            .args(&step.args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DeployError::Spawn {
                program: step.program.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .map(|out| tokio::spawn(collect_lines(out, step.stage, "stdout")));
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(collect_lines(err, step.stage, "stderr")));

        let waited = tokio::select! {
            status = child.wait() => status.map_err(DeployError::from),
            _ = tokio::time::sleep(self.timeout) => {
                warn!(stage = %step.stage, "{} timed out after {:?}, killing process", step.name, self.timeout);
                let _ = child.kill().await;
                Err(DeployError::Timeout {
                    step: step.name.clone(),
                    secs: self.timeout.as_secs(),
                })
            }
            _ = wait_cancelled(&mut cancel) => {
                info!(stage = %step.stage, "{} cancelled, killing process", step.name);
                let _ = child.kill().await;
                Err(DeployError::Cancelled)
            }
        };

        // Grandchildren may still hold the pipes after a kill.
        let status = match waited {
            Ok(status) => status,
            Err(e) => {
                for handle in [stdout, stderr].into_iter().flatten() {
                    handle.abort();
                }
                return Err(e);
            }
        };

        let stdout = match stdout {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        let stderr = match stderr {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        Ok(StepOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

async fn collect_lines<R: AsyncRead + Unpin>(reader: R, stage: Stage, stream: &'static str) -> String {
    let mut lines = BufReader::new(reader).lines();
    let mut out = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(stage = %stage, stream, "{}", line);
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Resolves once the flag is `true`. Never resolves if the sender goes away first.
pub(crate) async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> Step {
        Step {
            stage: Stage::Build,
            name: "sh".into(),
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
        }
    }

    fn executor() -> ProcessExecutor {
        ProcessExecutor::new(std::env::temp_dir())
    }

    #[tokio::test]
    async fn test_captures_output() {
        let (_tx, rx) = watch::channel(false);
        let output = executor()
            .execute(&shell("echo https://scorecard.run.app; echo warn >&2"), rx)
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout.trim(), "https://scorecard.run.app");
        assert_eq!(output.stderr.trim(), "warn");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_output() {
        let (_tx, rx) = watch::channel(false);
        let output = executor().execute(&shell("exit 3"), rx).await.unwrap();

        assert!(!output.success());
        assert_eq!(output.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let (_tx, rx) = watch::channel(false);
        let err = executor()
            .with_timeout(Duration::from_millis(100))
            .execute(&shell("exec sleep 5"), rx)
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_cancel_kills_child() {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let _ = tx.send(true);
        });

        let started = std::time::Instant::now();
        let err = executor().execute(&shell("exec sleep 5"), rx).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let (_tx, rx) = watch::channel(true);
        let err = executor().execute(&shell("echo never"), rx).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let (_tx, rx) = watch::channel(false);
        let step = Step {
            program: "definitely-not-a-real-tool".into(),
            args: vec![],
            ..shell("")
        };

        let err = executor().execute(&step, rx).await.unwrap_err();
        assert!(matches!(err, DeployError::Spawn { .. }));
    }
}
