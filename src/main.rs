// Stake Auditor - Entry point
// Principle: the auditor only reads the chain and reports what it cannot reproduce

#![allow(dead_code)]

mod audit;
mod cli;
mod codec;
mod notify;
mod rpc;
mod storage;
mod types;

#[cfg(test)]
mod tests;

use clap::Parser;
use cli::config::AuditorConfig;
use cli::runner::{run_auditor, run_range, show_status};
use cli::{Cli, Commands};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.verbose { "debug" } else { &cli.log_level };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter)),
        )
        .init();

    let config = AuditorConfig::resolve(cli.config.as_deref()).map_err(|e| {
        error!("Configuration error: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    match cli.command {
        Commands::Run(cmd) => {
            let config = config
                .with_rpc_url(cmd.rpc_url)
                .with_start_height(cmd.start_height)
                .with_data_dir(cmd.data_dir)
                .with_webhook_url(cmd.webhook)
                .with_term_seconds(cmd.term_seconds);

            if let Err(e) = run_auditor(config).await {
                error!("Auditor error: {}", e);
                return Err(anyhow::anyhow!("Auditor error: {}", e));
            }
        }

        Commands::Range(cmd) => {
            let config = config
                .with_rpc_url(cmd.rpc_url)
                .with_term_seconds(cmd.term_seconds);

            let summary = run_range(config, cmd.from, cmd.to).await.map_err(|e| {
                error!("Range audit error: {}", e);
                anyhow::anyhow!("Range audit error: {}", e)
            })?;

            if summary.discrepancies > 0 {
                anyhow::bail!(
                    "{} discrepancies found in #{}..=#{}",
                    summary.discrepancies,
                    cmd.from,
                    cmd.to
                );
            }
        }

        Commands::Status(cmd) => {
            let config = config.with_data_dir(cmd.data_dir);
            show_status(&config, cmd.last)?;
        }
    }

    Ok(())
}
