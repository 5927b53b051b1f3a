//! Tool invocations for one deployment.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::DeployConfig;
use crate::error::{DeployError, DeployResult};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Build,
    Push,
    Deploy,
    Verify,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Build, Stage::Push, Stage::Deploy, Stage::Verify];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Build => "build",
            Stage::Push => "push",
            Stage::Deploy => "deploy",
            Stage::Verify => "verify",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Build => "Build Image",
            Stage::Push => "Push Image",
            Stage::Deploy => "Deploy to Cloud Run",
            Stage::Verify => "Verify Deployment",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub stage: Stage,
    /// Short label such as `docker push`.
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
}

impl Step {
    fn new(stage: Stage, name: &str, program: &str, args: Vec<String>) -> Self {
        Self {
            stage,
            name: name.to_string(),
            program: program.to_string(),
            args,
        }
    }

    /// Shell-style rendering for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|part| {
                if part.is_empty() || part.contains(char::is_whitespace) {
                    format!("'{}'", part)
                } else {
                    part.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The ordered commands for deploying one commit.
///
/// The deploy stage has two steps: `gcloud run deploy` and the
/// `services describe` call that prints the service URL for verification.
/// Without a checkout the build context is the working directory.
#[derive(Debug, Clone, Serialize)]
pub struct PipelinePlan {
    pub commit: String,
    pub image: String,
    pub service: String,
    /// Worktree holding the commit's source, when the plan makes one.
    pub source: Option<PathBuf>,
    pub steps: Vec<Step>,
    /// Run after the pipeline whatever its outcome.
    pub cleanup: Vec<Step>,
}

impl PipelinePlan {
    pub fn new(config: &DeployConfig, commit: &str) -> DeployResult<Self> {
        let commit = validate_commit(commit)?;
        let image = config.image_ref(&commit);

        let build = build_step(&image, ".");

        let push = Step::new(Stage::Push, "docker push", "docker", vec!["push".into(), image.clone()]);

        let mut deploy_args = vec![
            "run".to_string(),
            "deploy".to_string(),
            config.service.clone(),
            "--image".to_string(),
            image.clone(),
            "--project".to_string(),
            config.project_id.clone(),
            "--region".to_string(),
            config.region.clone(),
            "--platform".to_string(),
            "managed".to_string(),
            "--memory".to_string(),
            config.memory.clone(),
            "--port".to_string(),
            config.port.to_string(),
            "--set-env-vars".to_string(),
            env_vars(config),
            "--set-secrets".to_string(),
            secrets(config),
        ];
        if config.allow_unauthenticated {
            deploy_args.push("--allow-unauthenticated".to_string());
        }
        let deploy = Step::new(Stage::Deploy, "gcloud run deploy", "gcloud", deploy_args);

        let describe = Step::new(
            Stage::Deploy,
            "gcloud run services describe",
            "gcloud",
            vec![
                "run".into(),
                "services".into(),
                "describe".into(),
                config.service.clone(),
                "--project".into(),
                config.project_id.clone(),
                "--region".into(),
                config.region.clone(),
                "--platform".into(),
                "managed".into(),
                "--format".into(),
                "value(status.url)".into(),
            ],
        );

        Ok(Self {
            commit,
            image,
            service: config.service.clone(),
            source: None,
            steps: vec![build, push, deploy, describe],
            cleanup: Vec::new(),
        })
    }

    /// Build from a detached worktree of the commit at `dir`.
    ///
    /// The commit is fetched from `remote` first, so it must be a full
    /// object name the remote will serve. The worktree is removed in cleanup.
    pub fn with_checkout(mut self, remote: &str, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let path = dir.display().to_string();

        let fetch = Step::new(
            Stage::Build,
            "git fetch",
            "git",
            vec!["fetch".into(), "--no-tags".into(), remote.to_string(), self.commit.clone()],
        );
        let worktree = Step::new(
            Stage::Build,
            "git worktree add",
            "git",
            vec![
                "worktree".into(),
                "add".into(),
                "--detach".into(),
                path.clone(),
                self.commit.clone(),
            ],
        );
        let build = build_step(&self.image, &path);

        self.steps.retain(|s| s.stage != Stage::Build);
        self.steps.splice(0..0, [fetch, worktree, build]);
        self.cleanup = vec![Step::new(
            Stage::Build,
            "git worktree remove",
            "git",
            vec!["worktree".into(), "remove".into(), "--force".into(), path],
        )];
        self.source = Some(dir);
        self
    }

    pub fn steps_for(&self, stage: Stage) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |s| s.stage == stage)
    }
}

fn build_step(image: &str, context: &str) -> Step {
    Step::new(
        Stage::Build,
        "docker build",
        "docker",
        vec!["build".into(), "-t".into(), image.to_string(), context.to_string()],
    )
}

fn env_vars(config: &DeployConfig) -> String {
    [
        ("GCP_PROJECT_ID", config.project_id.as_str()),
        ("GOOGLE_CLOUD_PROJECT", config.project_id.as_str()),
        ("GCP_BUCKET_NAME", config.bucket.as_str()),
        ("GCS_BUCKET", config.bucket.as_str()),
        ("GCP_LOCATION", config.region.as_str()),
        ("GOOGLE_APPLICATION_CREDENTIALS", config.credentials_mount.as_str()),
    ]
    .iter()
    .map(|(k, v)| format!("{}={}", k, v))
    .collect::<Vec<_>>()
    .join(",")
}

fn secrets(config: &DeployConfig) -> String {
    format!(
        "{}={}:latest,GEMINI_API_KEY={}:latest",
        config.credentials_mount, config.credentials_secret, config.api_key_secret
    )
}

/// Commits become image tags: `[A-Za-z0-9_.-]`, at most 128 chars, no leading `.` or `-`.
fn validate_commit(commit: &str) -> DeployResult<String> {
    let commit = commit.trim();
    let valid = !commit.is_empty()
        && commit.len() <= 128
        && !commit.starts_with(['.', '-'])
        && commit
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if valid {
        Ok(commit.to_string())
    } else {
        Err(DeployError::InvalidCommit(commit.to_string()))
    }
}
