//! Pagesmith - Task Publishing Daemon
//!
//! Accepts task briefs over HTTP, provisions (or reuses) a public
//! repository for each (requester, task) pair, publishes the generated
//! content via static hosting, and reports the result to the caller's
//! evaluation endpoint.

#![forbid(unsafe_code)]

mod audit;
mod github;
mod http_api;
mod notify;
mod registry;
mod workflow;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use audit::AuditLog;
use github::GitHubClient;
use http_api::AppState;
use notify::Notifier;
use pagesmith_common::DaemonConfig;
use registry::ConfirmationRegistry;
use workflow::Publisher;

#[derive(Parser)]
#[command(name = "pagesmithd")]
#[command(author, version, about = "Pagesmith daemon - task brief to published site")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Path to the received-tasks audit log (JSONL format)
    #[arg(long, default_value = "task_log.jsonl")]
    task_log: PathBuf,

    /// Path to the received-confirmations audit log (JSONL format)
    #[arg(long, default_value = "confirmation_log.jsonl")]
    confirmation_log: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("Starting Pagesmith daemon...");

    // Required secrets and credentials; absence is fatal at startup.
    let config = DaemonConfig::from_env().context("loading configuration from environment")?;
    info!(owner = %config.github_user, api = %config.api_base, "configuration loaded");

    let timeout = Duration::from_secs(config.http_timeout_secs);
    let provider = GitHubClient::new(
        config.api_base.clone(),
        config.github_user.clone(),
        config.github_token.clone(),
        timeout,
    )
    .context("building provider client")?;

    // Shared client for attachment fetches and evaluator callbacks.
    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("building HTTP client")?;

    let state = AppState {
        secret: config.secret,
        publisher: Arc::new(Publisher::new(Arc::new(provider), http.clone())),
        notifier: Notifier::new(http),
        registry: ConfirmationRegistry::new(),
        task_log: AuditLog::new(cli.task_log),
        confirmation_log: AuditLog::new(cli.confirmation_log),
        version: env!("CARGO_PKG_VERSION"),
        started_at: Instant::now(),
    };

    let router = http_api::create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(listener, router).await?;
    Ok(())
}
