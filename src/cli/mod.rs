// CLI - Command Line Interface for the stake auditor
// Principle: Simple, clear, composable commands

pub mod config;
pub mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stake auditor - independent reconciliation of fees, rewards and deposits
#[derive(Parser, Debug)]
#[command(name = "stake-auditor")]
#[command(author = "KratOs Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Recomputes block and term economics and compares them with the chain")]
#[command(long_about = r#"
The stake auditor replays every block of a proof-of-stake chain, recomputes
fee distribution, term settlement, penalties and deposit refunds, and reports
each balance that differs from what the node says.

Follow the chain tip, resuming from the last checkpoint:
  stake-auditor run --rpc-url http://127.0.0.1:8080

Audit a closed range without touching the checkpoint:
  stake-auditor range --from 1000 --to 5000

Show the checkpoint and recorded discrepancies:
  stake-auditor status
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", env = "STAKE_AUDITOR_LOG")]
    pub log_level: String,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "STAKE_AUDITOR_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Follow the chain and audit every new block
    Run(RunCmd),

    /// Audit a closed range of heights
    Range(RangeCmd),

    /// Show the persisted checkpoint
    Status(StatusCmd),
}

/// Follow the chain
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Node JSON-RPC endpoint
    #[arg(long, env = "STAKE_AUDITOR_RPC")]
    pub rpc_url: Option<String>,

    /// Height to cold-start from when no checkpoint exists (default: chain tip)
    #[arg(long)]
    pub start_height: Option<u64>,

    /// Directory holding the checkpoint database
    #[arg(short = 'd', long, env = "STAKE_AUDITOR_DATA")]
    pub data_dir: Option<PathBuf>,

    /// POST discrepancies to this URL as JSON
    #[arg(long)]
    pub webhook: Option<String>,

    /// Term length in seconds
    #[arg(long)]
    pub term_seconds: Option<u64>,
}

/// Audit a closed range
#[derive(Parser, Debug)]
pub struct RangeCmd {
    /// First height; state is seeded from this block
    #[arg(long)]
    pub from: u64,

    /// Last height audited (inclusive)
    #[arg(long)]
    pub to: u64,

    /// Node JSON-RPC endpoint
    #[arg(long, env = "STAKE_AUDITOR_RPC")]
    pub rpc_url: Option<String>,

    /// Term length in seconds
    #[arg(long)]
    pub term_seconds: Option<u64>,
}

/// Show the checkpoint
#[derive(Parser, Debug)]
pub struct StatusCmd {
    /// Directory holding the checkpoint database
    #[arg(short = 'd', long, env = "STAKE_AUDITOR_DATA")]
    pub data_dir: Option<PathBuf>,

    /// Number of most recent discrepancies to print
    #[arg(long, default_value = "10")]
    pub last: usize,
}
