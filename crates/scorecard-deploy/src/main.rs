//! Deployment pipeline binary.

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use scorecard_deploy::cli::{Cli, Command};
use scorecard_deploy::{
    router, verify_deployment, DeployConfig, Pipeline, PipelinePlan, ProcessExecutor, Trigger,
    VerifyConfig, WebhookState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let command = Cli::parse().command;

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    init_tracing();

    if let Command::Verify { url } = &command {
        let settings = VerifyConfig::from_env().context("Invalid verification settings")?;
        let verification = verify_deployment(&reqwest::Client::new(), url, &settings).await?;
        println!("{}", serde_json::to_string_pretty(&verification)?);
        return Ok(());
    }

    let config = DeployConfig::from_env().context("Invalid deployment configuration")?;

    match command {
        Command::Plan { sha } => {
            let commit = resolve_commit(sha).await?;
            let plan = PipelinePlan::new(&config, &commit)?;
            for step in &plan.steps {
                println!("[{}] {}", step.stage, step.command_line());
            }
            println!(
                "[verify] GET <service url> until it contains {:?} (window {:?})",
                config.verify.marker, config.verify.window
            );
        }
        Command::Run { git_ref, sha, manual } => {
            let git_ref = git_ref
                .or_else(|| env_value("GITHUB_REF"))
                .or_else(|| env_value("BRANCH_NAME"))
                .unwrap_or_else(|| config.main_branch.clone());
            let trigger = if manual {
                Trigger::manual(&git_ref)
            } else {
                Trigger::push(&git_ref)
            };
            if !trigger.should_deploy(&config.main_branch) {
                info!("Nothing to deploy for {}", trigger);
                return Ok(());
            }

            let commit = resolve_commit(sha).await?;
            let plan = PipelinePlan::new(&config, &commit)?;
            let pipeline = Pipeline::new(plan, config.verify.clone())?;
            let executor = ProcessExecutor::new(&config.work_dir).with_timeout(config.step_timeout);

            let (cancel_tx, cancel_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling run");
                    cancel_tx.send_replace(true);
                }
            });

            let report = pipeline.run(&executor, cancel_rx).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_success() {
                bail!(
                    "Deployment {:?}: {}",
                    report.status,
                    report.error.unwrap_or_default()
                );
            }
        }
        Command::Serve => {
            let executor = ProcessExecutor::new(&config.work_dir).with_timeout(config.step_timeout);
            let addr = config.webhook_addr.clone();
            if config.webhook_token.is_none() {
                warn!("WEBHOOK_TOKEN is not set; webhooks are accepted without authentication");
            }
            let app = router(WebhookState::new(config, Arc::new(executor)));

            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("Webhook listener on {}", addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        Command::Verify { .. } => {}
    }

    Ok(())
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scorecard_deploy=info,info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(false))
            .with(env_filter)
            .init();
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// `--sha`, then CI-provided variables, then the local checkout.
async fn resolve_commit(sha: Option<String>) -> anyhow::Result<String> {
    if let Some(commit) = sha
        .or_else(|| env_value("GITHUB_SHA"))
        .or_else(|| env_value("SHORT_SHA"))
        .or_else(|| env_value("COMMIT_SHA"))
    {
        return Ok(commit);
    }

    let output = tokio::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .await
        .context("Failed to run git; pass --sha instead")?;
    if !output.status.success() {
        bail!(
            "git rev-parse failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
