// CLI subcommand dispatch.

use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;

use commitcast_daemon::config::{global_config_path, Config};

pub mod init;
pub mod run;

#[derive(Subcommand)]
pub enum Command {
    /// Run the polling service until interrupted
    Run(run::RunArgs),
    /// Write a config file template
    InitConfig(init::InitArgs),
    /// Dry-run one repository: fetch, digest, print
    Test(test::TestArgs),
}

pub fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Run(args) => run::run(args),
        Command::InitConfig(args) => init::run(args),
        Command::Test(args) => test::run(args),
    }
}

/// Resolve the config path: explicit flag or `~/.commitcast/config.toml`.
pub(crate) fn resolve_config_path(flag: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match flag {
        Some(path) => Ok(path),
        None => global_config_path().context("could not determine home directory"),
    }
}

/// Load and validate the config the command will operate on.
pub(crate) fn load_config(flag: Option<PathBuf>) -> anyhow::Result<Config> {
    let path = resolve_config_path(flag)?;
    Config::load_from(&path)
        .with_context(|| format!("failed to load config from `{}`", path.display()))
}

/// Single-threaded runtime for one-shot commands.
pub(crate) fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime should build")
        .block_on(future)
}
