// commitcastd: standalone service entry point.

use anyhow::Context;
use tracing::info;

use commitcast_daemon::config::Config;
use commitcast_daemon::startup::{run_service, shutdown_on_ctrl_c};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load().context("failed to load configuration")?;
    info!("starting commitcast daemon");

    let shutdown = shutdown_on_ctrl_c();
    run_service(config, shutdown).await.context("daemon terminated unexpectedly")
}
