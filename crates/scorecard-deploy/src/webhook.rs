//! HTTP listener that turns push and dispatch events into pipeline runs.

use std::collections::VecDeque;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::DeployConfig;
use crate::error::{DeployError, DeployResult};
use crate::executor::StepExecutor;
use crate::groups::ConcurrencyGroups;
use crate::pipeline::{Pipeline, PipelineReport, RunStatus};
use crate::plan::PipelinePlan;
use crate::trigger::Trigger;

const MAX_RUN_HISTORY: usize = 50;
const TOKEN_HEADER: &str = "x-deploy-token";

/// Push event; the fields GitHub sends that we use.
#[derive(Debug, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Head commit after the push.
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub sha: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A run as listed by `GET /runs`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub group: String,
    pub trigger: Trigger,
    pub commit: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub superseded: Option<String>,
    pub report: Option<PipelineReport>,
}

#[derive(Clone)]
pub struct WebhookState {
    config: Arc<DeployConfig>,
    executor: Arc<dyn StepExecutor>,
    groups: ConcurrencyGroups,
    runs: Arc<RwLock<VecDeque<RunSummary>>>,
}

impl WebhookState {
    pub fn new(config: DeployConfig, executor: Arc<dyn StepExecutor>) -> Self {
        Self {
            config: Arc::new(config),
            executor,
            groups: ConcurrencyGroups::new(),
            runs: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    pub fn groups(&self) -> &ConcurrencyGroups {
        &self.groups
    }

    /// Most recent first.
    pub async fn runs(&self) -> Vec<RunSummary> {
        self.runs.read().await.iter().cloned().collect()
    }

    /// Start a pipeline for `commit` if the trigger calls for one.
    pub async fn start(&self, trigger: Trigger, commit: &str) -> DeployResult<StartResponse> {
        if !trigger.should_deploy(&self.config.main_branch) {
            info!("Ignoring {}", trigger);
            return Ok(StartResponse {
                status: "ignored",
                run_id: None,
                group: None,
                superseded: None,
                reason: Some(format!(
                    "only pushes to {} deploy",
                    self.config.main_branch
                )),
            });
        }

        // Each run builds from its own worktree so concurrent groups never
        // share a build context.
        let plan = PipelinePlan::new(&self.config, commit)?;
        let checkout = self
            .config
            .checkout_root
            .join(format!("{}-{}", plan.commit, Uuid::new_v4().simple()));
        let plan = plan.with_checkout(&self.config.git_remote, checkout);
        let pipeline = Pipeline::new(plan, self.config.verify.clone())?;

        let ticket = self.groups.begin(&trigger.concurrency_group()).await;
        let pipeline = pipeline.with_run_id(ticket.run_id.clone());
        info!(run_id = %ticket.run_id, group = %ticket.group, "Starting {} at {}", trigger, commit);

        {
            let mut runs = self.runs.write().await;
            runs.push_front(RunSummary {
                run_id: ticket.run_id.clone(),
                group: ticket.group.clone(),
                trigger,
                commit: pipeline.plan().commit.clone(),
                status: RunStatus::Running,
                started_at: Utc::now(),
                finished_at: None,
                superseded: ticket.superseded.clone(),
                report: None,
            });
            runs.truncate(MAX_RUN_HISTORY);
        }

        let response = StartResponse {
            status: "started",
            run_id: Some(ticket.run_id.clone()),
            group: Some(ticket.group.clone()),
            superseded: ticket.superseded.clone(),
            reason: None,
        };

        let state = self.clone();
        tokio::spawn(async move {
            let report = pipeline.run(state.executor.as_ref(), ticket.cancel).await;
            state.groups.finish(&ticket.group, &ticket.run_id).await;

            let mut runs = state.runs.write().await;
            if let Some(run) = runs.iter_mut().find(|r| r.run_id == ticket.run_id) {
                run.status = report.status;
                run.finished_at = report.finished_at;
                run.report = Some(report);
            }
        });

        Ok(response)
    }

    fn authorize(&self, headers: &HeaderMap) -> DeployResult<()> {
        let Some(expected) = self.config.webhook_token.as_deref() else {
            return Ok(());
        };
        let provided = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
        if provided == Some(expected) {
            Ok(())
        } else {
            warn!("Rejected webhook with missing or wrong token");
            Err(DeployError::Unauthorized)
        }
    }
}

impl IntoResponse for DeployError {
    fn into_response(self) -> Response {
        let status = match &self {
            DeployError::InvalidCommit(_) | DeployError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            DeployError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/hooks/push", post(push))
        .route("/hooks/dispatch", post(dispatch))
        .route("/runs", get(list_runs))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn accepted(response: StartResponse) -> (StatusCode, Json<StartResponse>) {
    let status = if response.run_id.is_some() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    (status, Json(response))
}

async fn push(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(event): Json<PushEvent>,
) -> DeployResult<(StatusCode, Json<StartResponse>)> {
    state.authorize(&headers)?;
    let trigger = Trigger::push(&event.git_ref);
    let commit = event.after.unwrap_or_default();
    if commit.is_empty() && trigger.should_deploy(&state.config.main_branch) {
        return Err(DeployError::invalid_request("push event has no `after` commit"));
    }
    Ok(accepted(state.start(trigger, &commit).await?))
}

async fn dispatch(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(request): Json<DispatchRequest>,
) -> DeployResult<(StatusCode, Json<StartResponse>)> {
    state.authorize(&headers)?;
    let git_ref = request
        .git_ref
        .unwrap_or_else(|| state.config.main_branch.clone());
    let commit = request
        .sha
        .ok_or_else(|| DeployError::invalid_request("`sha` is required"))?;
    Ok(accepted(state.start(Trigger::manual(&git_ref), &commit).await?))
}

async fn list_runs(State(state): State<WebhookState>) -> Json<serde_json::Value> {
    let runs = state.runs().await;
    Json(json!({ "count": runs.len(), "runs": runs }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}
