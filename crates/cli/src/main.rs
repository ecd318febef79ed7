//! Exa CLI - Fixed-rate credit installments, repayments and proposals.

mod cli;
mod commands;
mod output;
mod units;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::{run_installments, run_proposals, run_repay};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Installments(args) => {
            run_installments(&args, cli.format).await?;
        }
        Commands::Repay(args) => {
            run_repay(&args, cli.format).await?;
        }
        Commands::Proposals(args) => {
            run_proposals(&args, cli.format).await?;
        }
    }

    Ok(())
}
