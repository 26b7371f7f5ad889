// `commitcast init-config` — write a config file template.

use std::path::PathBuf;

use clap::Args;

use commitcast_daemon::config::Config;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Config file path (default: ~/.commitcast/config.toml).
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Overwrite an existing file.
    #[arg(long)]
    force: bool,
}

pub fn run(args: InitArgs) -> anyhow::Result<()> {
    let path = super::resolve_config_path(args.config)?;

    if path.exists() && !args.force {
        anyhow::bail!("`{}` already exists; pass --force to overwrite", path.display());
    }

    Config::default().save_to(&path)?;
    println!("config template written to {}", path.display());
    println!("fill in github.repos, relay.url and relay.group_id, then run `commitcast run`");
    Ok(())
}
