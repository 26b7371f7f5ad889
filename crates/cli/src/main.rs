// commitcast CLI entry point.

use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(name = "commitcast", about = "Commit digests for your chat group")]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::run(cli.command)
}
