//! Deployment pipeline for the Pitcher Scorecard service.
//!
//! A run builds the container image for one commit, pushes it to the
//! registry, deploys it to Cloud Run and then polls the service URL until
//! the landing page shows the application title. Stages run strictly in
//! order and the first failure stops the run. Runs for the same branch
//! share a concurrency group; starting a new one cancels the old one.

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod groups;
pub mod pipeline;
pub mod plan;
pub mod trigger;
pub mod verify;
pub mod webhook;

#[cfg(test)]
mod testing;

pub use config::{DeployConfig, VerifyConfig};
pub use error::{DeployError, DeployResult};
pub use executor::{ProcessExecutor, StepExecutor, StepOutput};
pub use groups::{ConcurrencyGroups, RunTicket};
pub use pipeline::{Pipeline, PipelineReport, RunStatus, StageRecord, StageStatus};
pub use plan::{PipelinePlan, Stage, Step};
pub use trigger::{concurrency_group, Trigger};
pub use verify::{verify_deployment, Verification};
pub use webhook::{router, WebhookState};
