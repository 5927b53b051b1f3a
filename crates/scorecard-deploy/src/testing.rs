//! Scripted step executor for pipeline tests.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::{DeployError, DeployResult};
use crate::executor::{wait_cancelled, StepExecutor, StepOutput};
use crate::plan::Step;

/// Records step names and answers without running anything.
///
/// `gcloud run services describe` prints the configured URL.
#[derive(Default)]
pub struct ScriptedExecutor {
    service_url: String,
    fail_at: Option<String>,
    block_at: Option<String>,
    executed: Mutex<Vec<Step>>,
}

impl ScriptedExecutor {
    pub fn new(service_url: &str) -> Self {
        Self {
            service_url: service_url.to_string(),
            ..Self::default()
        }
    }

    /// Exit 1 from the named step.
    pub fn fail_at(mut self, step: &str) -> Self {
        self.fail_at = Some(step.to_string());
        self
    }

    /// Hang in the named step until cancelled.
    pub fn block_at(mut self, step: &str) -> Self {
        self.block_at = Some(step.to_string());
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().iter().map(|s| s.name.clone()).collect()
    }

    /// Rendered command lines, in execution order.
    pub fn commands(&self) -> Vec<String> {
        self.executed.lock().unwrap().iter().map(Step::command_line).collect()
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn execute(&self, step: &Step, mut cancel: watch::Receiver<bool>) -> DeployResult<StepOutput> {
        if *cancel.borrow() {
            return Err(DeployError::Cancelled);
        }
        self.executed.lock().unwrap().push(step.clone());

        if self.block_at.as_deref() == Some(step.name.as_str()) {
            wait_cancelled(&mut cancel).await;
            return Err(DeployError::Cancelled);
        }

        if self.fail_at.as_deref() == Some(step.name.as_str()) {
            return Ok(StepOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: format!("{} failed", step.name),
            });
        }

        let stdout = if step.name == "gcloud run services describe" {
            format!("{}\n", self.service_url)
        } else {
            String::new()
        };

        Ok(StepOutput {
            exit_code: Some(0),
            stdout,
            stderr: String::new(),
        })
    }
}
