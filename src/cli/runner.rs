// Runner - Host loop around the auditor
// Principle: a height is checkpointed only after it fully committed

use super::config::{AuditorConfig, ConfigError};
use crate::audit::{AuditError, AuditReport, Auditor};
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::rpc::{ChainQuery, RpcClient, RpcError};
use crate::storage::{Checkpoint, CheckpointStore, DatabaseError};
use crate::types::BlockNumber;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, info, warn};

/// Runner errors
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Audit failed at #{height}: {source}")]
    Audit {
        height: BlockNumber,
        #[source]
        source: AuditError,
    },

    #[error("Invalid range: {from}..={to}")]
    InvalidRange { from: BlockNumber, to: BlockNumber },
}

/// How transient failures are retried
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AuditorConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: config.retry_backoff(),
        }
    }
}

/// Totals over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub heights: u64,
    pub discrepancies: u64,
    pub term_boundaries: u64,
}

impl RunSummary {
    fn record(&mut self, report: &AuditReport) {
        self.heights += 1;
        self.discrepancies += report.discrepancies.len() as u64;
        if report.is_term_boundary() {
            self.term_boundaries += 1;
        }
    }
}

/// Follow the chain from the checkpoint (or a cold start) until Ctrl+C
pub async fn run_auditor(config: AuditorConfig) -> Result<(), RunnerError> {
    config.validate()?;

    info!("🚀 Starting stake auditor");
    info!("📡 Node: {}", config.rpc_url);
    info!("📁 Data path: {}", config.data_dir.display());
    info!("⏱️  Term length: {}s", config.term_seconds);

    std::fs::create_dir_all(&config.data_dir)
        .map_err(|e| DatabaseError::OpenFailed(e.to_string()))?;
    let store = CheckpointStore::open(&config.data_dir)?;
    let client = RpcClient::new(&config.rpc_url, config.request_timeout())?;
    let notifiers = build_notifiers(&config);
    let policy = RetryPolicy::from_config(&config);

    let mut auditor = Auditor::new(client, config.audit_settings())
        .map_err(|source| RunnerError::Audit { height: 0, source })?;

    let start = match store.load()? {
        Some(checkpoint) => {
            info!("📦 Resuming after #{}", checkpoint.last_audited);
            auditor = auditor.with_state(checkpoint.state);
            checkpoint.last_audited + 1
        }
        None => match config.start_height {
            Some(height) => height,
            None => auditor.chain().best_block_number().await?,
        },
    };

    let mut summary = RunSummary::default();

    loop {
        let next = auditor.next_height().unwrap_or(start);
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("⚠️  Ctrl+C received, shutting down...");
                break;
            }

            result = step(&mut auditor, next, &store, &notifiers, policy) => {
                match result? {
                    Some(report) => summary.record(&report),
                    None => tokio::time::sleep(config.poll_interval()).await,
                }
            }
        }
    }

    info!(
        "👋 Stopped after {} heights: {} discrepancies, {} term boundaries",
        summary.heights, summary.discrepancies, summary.term_boundaries
    );
    Ok(())
}

/// Audit `height` if the node has it, persisting the result
async fn step<C: ChainQuery>(
    auditor: &mut Auditor<C>,
    height: BlockNumber,
    store: &CheckpointStore,
    notifiers: &[Box<dyn Notifier>],
    policy: RetryPolicy,
) -> Result<Option<AuditReport>, RunnerError> {
    let best = auditor.chain().best_block_number().await?;
    if height > best {
        return Ok(None);
    }

    let report = audit_and_notify(auditor, height, notifiers, policy).await?;
    if let Some(state) = auditor.state() {
        let checkpoint = Checkpoint {
            last_audited: height,
            state: state.clone(),
        };
        store.save(&checkpoint, &report.discrepancies)?;
    }
    Ok(Some(report))
}

/// Audit a closed range, cold-starting at `from`
pub async fn run_range(config: AuditorConfig, from: BlockNumber, to: BlockNumber) -> Result<RunSummary, RunnerError> {
    config.validate()?;

    let client = RpcClient::new(&config.rpc_url, config.request_timeout())?;
    let auditor = Auditor::new(client, config.audit_settings())
        .map_err(|source| RunnerError::Audit { height: from, source })?;

    info!("🔍 Auditing #{}..=#{} against {}", from, to, config.rpc_url);
    let summary = audit_range(
        auditor,
        from,
        to,
        &build_notifiers(&config),
        RetryPolicy::from_config(&config),
    )
    .await?;

    info!(
        "✅ Range done: {} heights, {} discrepancies, {} term boundaries",
        summary.heights, summary.discrepancies, summary.term_boundaries
    );
    Ok(summary)
}

/// Audit `from..=to` with a fresh auditor
pub async fn audit_range<C: ChainQuery>(
    mut auditor: Auditor<C>,
    from: BlockNumber,
    to: BlockNumber,
    notifiers: &[Box<dyn Notifier>],
    policy: RetryPolicy,
) -> Result<RunSummary, RunnerError> {
    if from > to {
        return Err(RunnerError::InvalidRange { from, to });
    }

    let mut summary = RunSummary::default();
    for height in from..=to {
        let report = audit_and_notify(&mut auditor, height, notifiers, policy).await?;
        summary.record(&report);
    }
    Ok(summary)
}

/// Retry transient failures, hand findings to the notifiers
async fn audit_and_notify<C: ChainQuery>(
    auditor: &mut Auditor<C>,
    height: BlockNumber,
    notifiers: &[Box<dyn Notifier>],
    policy: RetryPolicy,
) -> Result<AuditReport, RunnerError> {
    let report = match audit_with_retry(auditor, height, policy).await {
        Ok(report) => report,
        Err(source) => {
            let message = source.to_string();
            for notifier in notifiers {
                if let Err(e) = notifier.fatal(height, &message).await {
                    warn!("⚠️  Notifier failed: {}", e);
                }
            }
            return Err(RunnerError::Audit { height, source });
        }
    };

    if !report.is_clean() {
        info!(
            "📋 #{}: {} of {} audited accounts disagree with the chain",
            height,
            report.discrepancies.len(),
            report.audited
        );
    }
    for discrepancy in &report.discrepancies {
        for notifier in notifiers {
            if let Err(e) = notifier.discrepancy(discrepancy).await {
                warn!("⚠️  Notifier failed: {}", e);
            }
        }
    }
    Ok(report)
}

/// Audit one height, retrying transient failures with doubling backoff
pub async fn audit_with_retry<C: ChainQuery>(
    auditor: &mut Auditor<C>,
    height: BlockNumber,
    policy: RetryPolicy,
) -> Result<AuditReport, AuditError> {
    let mut backoff = policy.initial_backoff;
    let mut attempt = 0;

    loop {
        match auditor.audit_height(height).await {
            Ok(report) => return Ok(report),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                warn!(
                    "⚠️  #{} failed ({}), retry {}/{} in {:?}",
                    height, e, attempt, policy.max_retries, backoff
                );
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Print the checkpoint and the most recent discrepancies
pub fn show_status(config: &AuditorConfig, last: usize) -> Result<(), RunnerError> {
    if !config.data_dir.exists() {
        println!("No checkpoint at {}", config.data_dir.display());
        return Ok(());
    }

    let store = CheckpointStore::open(&config.data_dir)?;
    match store.load()? {
        Some(checkpoint) => {
            let state = &checkpoint.state;
            println!("Last audited height: {}", checkpoint.last_audited);
            if let Some(time) = chrono::DateTime::from_timestamp(state.parent_timestamp as i64, 0) {
                println!("Last audited block time: {}", time.to_rfc3339());
            }
            println!("Current term starts at: #{}", state.current_window_start);
            println!("Validators in roster: {}", state.current_validators.len());
            match state.nominations.total() {
                Some(total) => println!(
                    "Nomination deposits: {} accounts, {} total",
                    state.nominations.len(),
                    total
                ),
                None => println!(
                    "Nomination deposits: {} accounts, total exceeds the balance range",
                    state.nominations.len()
                ),
            }
        }
        None => println!("No checkpoint yet"),
    }

    let discrepancies = store.discrepancies()?;
    println!("Recorded discrepancies: {}", discrepancies.len());
    for discrepancy in discrepancies.iter().rev().take(last) {
        println!("  {}", discrepancy);
    }
    debug!("Status read from {}", config.data_dir.display());
    Ok(())
}

fn build_notifiers(config: &AuditorConfig) -> Vec<Box<dyn Notifier>> {
    let mut notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(LogNotifier)];
    if let Some(url) = &config.webhook_url {
        match WebhookNotifier::new(url, config.request_timeout()) {
            Ok(webhook) => {
                info!("🔔 Webhook: {}", url);
                notifiers.push(Box::new(webhook));
            }
            Err(e) => warn!("⚠️  Webhook disabled: {}", e),
        }
    }
    notifiers
}
