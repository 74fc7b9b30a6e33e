// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Lock {
            manifest,
            resolve,
            output,
        } => commands::cmd_lock(&manifest, &resolve, output.as_deref()).await,
        Commands::Plan {
            manifest,
            resolve,
            json,
            link_order,
        } => commands::cmd_plan(&manifest, &resolve, json, link_order.as_deref()).await,
        Commands::Check { manifest } => commands::cmd_check(&manifest),
        Commands::Verify {
            manifest,
            resolve,
            lockfile,
        } => commands::cmd_verify(&manifest, &resolve, lockfile.as_deref()).await,
    }
}
