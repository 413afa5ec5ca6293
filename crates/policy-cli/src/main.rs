//! Policy assistant command-line interface
use anyhow::Result;
use clap::Parser as _;
use policy_cli::{Cli, handlers};
use policy_core::RagConfig;
use tokio::io;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    handlers::init_logging();

    let config = RagConfig::load(cli.config.as_deref())?;
    let mut stdout = io::stdout();
    handlers::run(cli.command, &config, &mut stdout).await
}
