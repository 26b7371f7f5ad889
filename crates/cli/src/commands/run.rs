// `commitcast run` — run the polling service in the foreground.

use std::path::PathBuf;

use clap::Args;

use commitcast_daemon::startup::{run_service, shutdown_on_ctrl_c};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Config file path (default: ~/.commitcast/config.toml).
    #[arg(long, short)]
    config: Option<PathBuf>,
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = super::load_config(args.config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("tokio runtime should build")
        .block_on(async {
            let shutdown = shutdown_on_ctrl_c();
            run_service(config, shutdown).await
        })
}
