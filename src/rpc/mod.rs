// RPC - Read-only queries against the audited chain
// Principle: the auditor only ever reads, every call is keyed by height

pub mod client;
pub mod types;

pub use client::RpcClient;

use crate::types::{AccountId, AccountState, Balance, Block, BlockNumber, Weight};
use async_trait::async_trait;

/// Errors returned by chain queries
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(u16),

    #[error("RPC error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty response to {0}")]
    EmptyResponse(String),

    #[error("Block #{0} not found")]
    BlockNotFound(BlockNumber),
}

impl RpcError {
    /// Network failures, timeouts and server-side HTTP errors are worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Network(_) | RpcError::Timeout(_) => true,
            RpcError::Http(status) => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RpcError::Timeout(e.to_string())
        } else if let Some(status) = e.status() {
            RpcError::Http(status.as_u16())
        } else if e.is_decode() {
            RpcError::Parse(e.to_string())
        } else {
            RpcError::Network(e.to_string())
        }
    }
}

/// Chain state the auditor consumes
#[async_trait]
pub trait ChainQuery: Send + Sync {
    async fn block(&self, height: BlockNumber) -> Result<Block, RpcError>;

    async fn balance(&self, account: AccountId, height: BlockNumber) -> Result<Balance, RpcError>;

    /// Stakeholder weights, valid for this height only
    async fn weights(&self, height: BlockNumber) -> Result<Vec<Weight>, RpcError>;

    async fn stakeholders(&self, height: BlockNumber) -> Result<Vec<AccountId>, RpcError>;

    /// Accounts in `state`; validators come back in signer-index order
    async fn accounts_in_state(
        &self,
        state: AccountState,
        height: BlockNumber,
    ) -> Result<Vec<AccountId>, RpcError>;

    async fn candidate_deposits(
        &self,
        height: BlockNumber,
    ) -> Result<Vec<(AccountId, Balance)>, RpcError>;

    async fn best_block_number(&self) -> Result<BlockNumber, RpcError>;
}
