// Wires configuration into concrete clients and runs the scheduler.
//
// Dependencies are constructed once here and handed to the scheduler,
// which owns them for the life of the process. One reqwest client is
// shared across all three collaborators.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

use crate::config::Config;
use crate::relay::GroupRelay;
use crate::runtime::Scheduler;
use crate::source::GithubSource;
use crate::store::CheckpointStore;
use crate::summarize::OpenAiSummarizer;
use crate::sync::Syncer;

pub type DefaultSyncer = Syncer<GithubSource, OpenAiSummarizer, GroupRelay>;

/// Shared HTTP client with the configured per-request timeout.
pub fn http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("failed to build http client")
}

/// Build the chat relay client on its own, for connectivity probes.
pub fn build_relay(config: &Config) -> Result<GroupRelay> {
    let client = http_client(config)?;
    relay_with_client(client, config)
}

fn relay_with_client(client: reqwest::Client, config: &Config) -> Result<GroupRelay> {
    Ok(GroupRelay::new(
        client,
        config.relay.url.clone(),
        config.relay_group_id().context("config was not validated")?,
        (!config.relay.token.is_empty()).then(|| config.relay.token.clone()),
    ))
}

/// Build the orchestrator from a validated config.
pub fn build_syncer(config: &Config) -> Result<DefaultSyncer> {
    let client = http_client(config)?;
    let store = CheckpointStore::open(config.database_path()?)?;

    let source = GithubSource::new(
        client.clone(),
        config.github.token.clone(),
        config.github.fetch_page_size,
    );
    let summarizer = OpenAiSummarizer::new(
        client.clone(),
        config.summary.base_url.clone(),
        config.summary.api_key.clone(),
        config.summary.model.clone(),
    );
    let relay = relay_with_client(client, config)?;

    Ok(Syncer::new(store, source, summarizer, relay)
        .with_fallback_digest(config.summary.fallback_digest))
}

/// Run the polling service until `shutdown` flips to true.
pub async fn run_service(config: Config, shutdown: watch::Receiver<bool>) -> Result<()> {
    let syncer = Arc::new(build_syncer(&config)?);
    let repos = config.github.repos.clone();

    info!(
        repos = %repos.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
        "watching repositories"
    );

    let scheduler = Scheduler::new(
        syncer,
        repos,
        config.poll_interval(),
        config.error_cooldown(),
    );
    scheduler.run(shutdown).await;
    Ok(())
}

/// Watch channel that flips on ctrl-c.
pub fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        let _ = tx.send(true);
    });
    rx
}
