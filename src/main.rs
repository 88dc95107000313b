//! `hct` command-line entry point.

mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Get(args) => cli::get::cmd_get(args, cli.verbose).await,
        Command::Sweep(args) => cli::sweep::cmd_sweep(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "hct=debug" } else { "hct=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
