//! The build, push, deploy, verify state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::VerifyConfig;
use crate::error::{DeployError, DeployResult};
use crate::executor::{wait_cancelled, StepExecutor};
use crate::plan::{PipelinePlan, Stage};
use crate::verify::verify_deployment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

/// Outcome of one stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub display_name: String,
    pub status: StageStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub message: Option<String>,
}

impl StageRecord {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            display_name: stage.display_name().to_string(),
            status: StageStatus::Pending,
            started_at: None,
            finished_at: None,
            duration_ms: None,
            message: None,
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status = StageStatus::Running;
    }

    pub fn finish(&mut self, success: bool, message: Option<String>) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.status = if success {
            StageStatus::Success
        } else {
            StageStatus::Failed
        };
        self.message = message;
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds());
        }
    }

    pub fn skip(&mut self, reason: Option<String>) {
        self.status = StageStatus::Skipped;
        self.message = reason;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

/// Result of a pipeline run, one record per stage in order.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub commit: String,
    pub image: String,
    /// Directory the image was built from, when not the working directory.
    pub source: Option<String>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub service_url: Option<String>,
    pub stages: Vec<StageRecord>,
    pub error: Option<String>,
}

impl PipelineReport {
    fn new(run_id: &str, plan: &PipelinePlan) -> Self {
        Self {
            run_id: run_id.to_string(),
            commit: plan.commit.clone(),
            image: plan.image.clone(),
            source: plan.source.as_ref().map(|p| p.display().to_string()),
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            service_url: None,
            stages: Vec::with_capacity(Stage::ALL.len()),
            error: None,
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// One deployment of one commit.
pub struct Pipeline {
    run_id: String,
    plan: PipelinePlan,
    verify: VerifyConfig,
    client: reqwest::Client,
}

impl Pipeline {
    pub fn new(plan: PipelinePlan, verify: VerifyConfig) -> DeployResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("scorecard-deploy/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            run_id: Uuid::new_v4().to_string(),
            plan,
            verify,
            client,
        })
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn plan(&self) -> &PipelinePlan {
        &self.plan
    }

    /// Run every stage in order.
    ///
    /// The first failure or a cancellation stops the run. Stages that never
    /// started are reported as skipped.
    pub async fn run<E>(&self, executor: &E, mut cancel: watch::Receiver<bool>) -> PipelineReport
    where
        E: StepExecutor + ?Sized,
    {
        let mut report = PipelineReport::new(&self.run_id, &self.plan);
        info!(run_id = %self.run_id, "Deploying {}", self.plan.image);

        let result = self.execute(executor, &mut cancel, &mut report).await;
        self.clean_up(executor).await;

        report.status = match &result {
            Ok(()) => RunStatus::Success,
            Err(DeployError::Cancelled) => RunStatus::Cancelled,
            Err(_) => RunStatus::Failed,
        };
        if let Err(e) = &result {
            report.error = Some(e.to_string());
        }

        let reason = match report.status {
            RunStatus::Cancelled => "run cancelled",
            _ => "previous stage failed",
        };
        for stage in Stage::ALL {
            if report.stage(stage).is_none() {
                let mut record = StageRecord::new(stage);
                record.skip(Some(reason.to_string()));
                report.stages.push(record);
            }
        }
        report.finished_at = Some(Utc::now());

        match report.status {
            RunStatus::Success => info!(run_id = %self.run_id, "Deployment of {} verified", self.plan.commit),
            RunStatus::Cancelled => warn!(run_id = %self.run_id, "Deployment of {} cancelled", self.plan.commit),
            _ => error!(
                run_id = %self.run_id,
                "Deployment of {} failed: {}",
                self.plan.commit,
                report.error.as_deref().unwrap_or_default()
            ),
        }

        report
    }

    async fn execute<E>(
        &self,
        executor: &E,
        cancel: &mut watch::Receiver<bool>,
        report: &mut PipelineReport,
    ) -> DeployResult<()>
    where
        E: StepExecutor + ?Sized,
    {
        for stage in [Stage::Build, Stage::Push, Stage::Deploy] {
            if *cancel.borrow() {
                return Err(DeployError::Cancelled);
            }

            let mut record = StageRecord::new(stage);
            record.start();
            info!(run_id = %self.run_id, stage = %stage, "{}", stage.display_name());

            let result = self.run_stage(executor, stage, cancel).await;
            match result {
                Ok(stdout) => {
                    if stage == Stage::Deploy {
                        let url = parse_service_url(&stdout);
                        match url {
                            Some(url) => {
                                record.finish(true, Some(url.clone()));
                                report.service_url = Some(url);
                            }
                            None => {
                                let err = DeployError::MissingServiceUrl(stdout.trim().to_string());
                                record.finish(false, Some(err.to_string()));
                                report.stages.push(record);
                                return Err(err);
                            }
                        }
                    } else {
                        record.finish(true, None);
                    }
                    report.stages.push(record);
                }
                Err(e) => {
                    record.finish(false, Some(e.to_string()));
                    report.stages.push(record);
                    return Err(e);
                }
            }
        }

        let url = report.service_url.clone().unwrap_or_default();
        let mut record = StageRecord::new(Stage::Verify);
        record.start();
        info!(run_id = %self.run_id, stage = %Stage::Verify, "{}", Stage::Verify.display_name());

        let result = tokio::select! {
            result = verify_deployment(&self.client, &url, &self.verify) => result,
            _ = wait_cancelled(cancel) => Err(DeployError::Cancelled),
        };

        match result {
            Ok(verification) => {
                record.finish(
                    true,
                    Some(format!(
                        "marker found after {} attempt(s)",
                        verification.attempts
                    )),
                );
                report.stages.push(record);
                Ok(())
            }
            Err(e) => {
                record.finish(false, Some(e.to_string()));
                report.stages.push(record);
                Err(e)
            }
        }
    }

    /// Cleanup steps run even after a cancellation, so they get their own flag.
    async fn clean_up<E>(&self, executor: &E)
    where
        E: StepExecutor + ?Sized,
    {
        let (_tx, rx) = watch::channel(false);
        for step in &self.plan.cleanup {
            match executor.execute(step, rx.clone()).await {
                Ok(output) if output.success() => {}
                Ok(output) => warn!(
                    run_id = %self.run_id,
                    "{} exited with {:?}: {}",
                    step.name,
                    output.exit_code,
                    stderr_tail(&output.stderr)
                ),
                Err(e) => warn!(run_id = %self.run_id, "{} failed: {}", step.name, e),
            }
        }
    }

    /// Run the stage's steps in order, returning the last step's stdout.
    async fn run_stage<E>(
        &self,
        executor: &E,
        stage: Stage,
        cancel: &watch::Receiver<bool>,
    ) -> DeployResult<String>
    where
        E: StepExecutor + ?Sized,
    {
        let mut stdout = String::new();
        for step in self.plan.steps_for(stage) {
            let output = executor.execute(step, cancel.clone()).await?;
            if !output.success() {
                return Err(DeployError::StepFailed {
                    step: step.name.clone(),
                    exit_code: output.exit_code,
                    stderr: stderr_tail(&output.stderr),
                });
            }
            stdout = output.stdout;
        }
        Ok(stdout)
    }
}

/// First `http(s)://` line of `gcloud ... --format value(status.url)` output.
fn parse_service_url(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("https://") || line.starts_with("http://"))
        .map(str::to_string)
}

fn stderr_tail(stderr: &str) -> String {
    const TAIL_LINES: usize = 20;
    let lines: Vec<&str> = stderr.lines().collect();
    lines[lines.len().saturating_sub(TAIL_LINES)..].join("\n")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::DeployConfig;
    use crate::testing::ScriptedExecutor;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn verify_settings() -> VerifyConfig {
        VerifyConfig {
            marker: "Pitcher Scorecard".into(),
            initial_delay: Duration::ZERO,
            interval: Duration::from_millis(20),
            window: Duration::from_millis(200),
            request_timeout: Duration::from_secs(2),
        }
    }

    fn pipeline() -> Pipeline {
        let plan = PipelinePlan::new(&DeployConfig::new("pitch-lab"), "3f2a9c1").unwrap();
        Pipeline::new(plan, verify_settings()).unwrap()
    }

    async fn serving(body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    fn statuses(report: &PipelineReport) -> Vec<StageStatus> {
        report.stages.iter().map(|r| r.status).collect()
    }

    #[tokio::test]
    async fn test_successful_run() {
        let server = serving("<title>Pitcher Scorecard</title>").await;
        let executor = ScriptedExecutor::new(&server.uri());
        let (_tx, rx) = watch::channel(false);

        let report = pipeline().run(&executor, rx).await;

        assert!(report.is_success(), "{:?}", report.error);
        assert_eq!(report.service_url.as_deref(), Some(server.uri().as_str()));
        assert_eq!(statuses(&report), vec![StageStatus::Success; 4]);
        assert_eq!(
            executor.executed(),
            vec![
                "docker build",
                "docker push",
                "gcloud run deploy",
                "gcloud run services describe"
            ]
        );
        assert!(report.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_failure_stops_pipeline() {
        let executor = ScriptedExecutor::new("https://unused.example").fail_at("docker push");
        let (_tx, rx) = watch::channel(false);

        let report = pipeline().run(&executor, rx).await;

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(
            statuses(&report),
            vec![
                StageStatus::Success,
                StageStatus::Failed,
                StageStatus::Skipped,
                StageStatus::Skipped
            ]
        );
        assert_eq!(executor.executed(), vec!["docker build", "docker push"]);
        assert!(report.error.unwrap().contains("docker push exited with status 1"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let executor = ScriptedExecutor::new("https://unused.example");
        let (_tx, rx) = watch::channel(true);

        let report = pipeline().run(&executor, rx).await;

        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(statuses(&report), vec![StageStatus::Skipped; 4]);
        assert!(executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_build() {
        let executor = ScriptedExecutor::new("https://unused.example").block_at("docker build");
        let (tx, rx) = watch::channel(false);
        let pipeline = pipeline();

        let run = pipeline.run(&executor, rx);
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send_replace(true);
        };
        let (report, ()) = tokio::join!(run, cancel);

        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(report.stages[0].status, StageStatus::Failed);
        assert_eq!(report.stages[1].status, StageStatus::Skipped);
        assert_eq!(report.stages[1].message.as_deref(), Some("run cancelled"));
    }

    #[tokio::test]
    async fn test_verification_failure() {
        let server = serving("Hello World").await;
        let executor = ScriptedExecutor::new(&server.uri());
        let (_tx, rx) = watch::channel(false);

        let report = pipeline().run(&executor, rx).await;

        assert_eq!(report.status, RunStatus::Failed);
        let verify = report.stage(Stage::Verify).unwrap();
        assert_eq!(verify.status, StageStatus::Failed);
        assert!(verify.message.as_deref().unwrap().contains("Pitcher Scorecard"));
    }

    #[tokio::test]
    async fn test_missing_service_url() {
        let executor = ScriptedExecutor::new("");
        let (_tx, rx) = watch::channel(false);

        let report = pipeline().run(&executor, rx).await;

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.stage(Stage::Deploy).unwrap().status, StageStatus::Failed);
        assert_eq!(report.stage(Stage::Verify).unwrap().status, StageStatus::Skipped);
    }

    #[tokio::test]
    async fn test_worktree_removed_after_cancel() {
        let plan = PipelinePlan::new(&DeployConfig::new("pitch-lab"), "3f2a9c1")
            .unwrap()
            .with_checkout("origin", "/tmp/checkouts/3f2a9c1");
        let pipeline = Pipeline::new(plan, verify_settings()).unwrap();
        let executor = ScriptedExecutor::new("https://unused.example").block_at("docker build");
        let (tx, rx) = watch::channel(false);

        let run = pipeline.run(&executor, rx);
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send_replace(true);
        };
        let (report, ()) = tokio::join!(run, cancel);

        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(
            executor.executed(),
            vec!["git fetch", "git worktree add", "docker build", "git worktree remove"]
        );
    }

    #[test]
    fn test_parse_service_url() {
        assert_eq!(
            parse_service_url("https://pitcher-scorecard-abc123-uc.a.run.app\n").as_deref(),
            Some("https://pitcher-scorecard-abc123-uc.a.run.app")
        );
        assert_eq!(parse_service_url("Deploying...\n"), None);
    }

    #[test]
    fn test_stderr_tail() {
        let stderr: String = (0..30).map(|i| format!("line {}\n", i)).collect();
        let tail = stderr_tail(&stderr);
        assert!(tail.starts_with("line 10"));
        assert!(tail.ends_with("line 29"));
    }
}
