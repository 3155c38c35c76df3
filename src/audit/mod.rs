// Audit - Independent recomputation of block and term economics
// Principle: expected balances are derived, never read back from the chain

pub mod classifier;
pub mod deposits;
pub mod distributor;
pub mod driver;
pub mod ledger;
pub mod report;
pub mod settlement;
pub mod term;

pub use classifier::{Classifier, MinimumFees, TxEffect, DEFAULT_STAKE_HANDLER_ID};
pub use deposits::NominationDeposits;
pub use distributor::{distribute, DistributionError, FeeDistribution};
pub use driver::{AuditSettings, Auditor, AuditorState};
pub use ledger::{LedgerAccumulator, LedgerError};
pub use report::{AuditReport, Discrepancy, SubjectKind};
pub use settlement::{reward_after_penalty, SettlementOutcome, StateSnapshot};
pub use term::{term_id, TermData, TermRing, TermWindow, VoteTally};

use crate::codec::BitsetError;
use crate::rpc::RpcError;
use crate::types::BlockNumber;

/// Errors that stop the audit of a height
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Chain query failed: {0}")]
    Rpc(#[from] RpcError),

    #[error("Invalid precommit bitset: {0}")]
    Bitset(#[from] BitsetError),

    #[error("Ledger invariant violated: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Fee distribution failed: {0}")]
    Distribution(#[from] DistributionError),

    #[error("Invariant violated at #{height}: {reason}")]
    Invariant { height: BlockNumber, reason: String },

    #[error("Heights must be audited in order: expected #{expected}, got #{actual}")]
    OutOfOrder {
        expected: BlockNumber,
        actual: BlockNumber,
    },

    #[error("Invalid audit settings: {0}")]
    Settings(String),
}

impl AuditError {
    /// Only chain query failures can succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, AuditError::Rpc(e) if e.is_transient())
    }
}
