// RPC client - JSON-RPC 2.0 over HTTP
use super::types::{DepositEntry, JsonRpcRequest, JsonRpcResponse, WeightEntry};
use super::{ChainQuery, RpcError};
use crate::types::{AccountId, AccountState, Balance, Block, BlockNumber, Weight};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

/// RPC client for the audited node
pub struct RpcClient {
    url: String,
    client: Client,
    request_id: AtomicU64,
}

impl RpcClient {
    /// Create new RPC client with a per-request timeout
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Network(e.to_string()))?;

        Ok(Self {
            url: url.to_string(),
            client,
            request_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Make a JSON-RPC call, `None` when the node answers `null`
    async fn call_optional<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<Option<T>, RpcError> {
        let request = JsonRpcRequest::new(method, params, self.next_id());
        trace!("→ {} #{}", method, request.id);

        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Http(status.as_u16()));
        }

        let json_response: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| RpcError::Parse(e.to_string()))?;

        if let Some(error) = json_response.error {
            return Err(RpcError::Remote {
                code: error.code,
                message: error.message,
            });
        }

        Ok(json_response.result)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<T, RpcError> {
        self.call_optional(method, params)
            .await?
            .ok_or_else(|| RpcError::EmptyResponse(method.to_string()))
    }
}

#[async_trait]
impl ChainQuery for RpcClient {
    async fn block(&self, height: BlockNumber) -> Result<Block, RpcError> {
        self.call_optional("chain_getBlockByNumber", serde_json::json!([height]))
            .await?
            .ok_or(RpcError::BlockNotFound(height))
    }

    async fn balance(&self, account: AccountId, height: BlockNumber) -> Result<Balance, RpcError> {
        self.call("chain_getBalance", serde_json::json!([account, height]))
            .await
    }

    async fn weights(&self, height: BlockNumber) -> Result<Vec<Weight>, RpcError> {
        let entries: Vec<WeightEntry> = self
            .call("stake_getWeights", serde_json::json!([height]))
            .await?;
        Ok(entries
            .into_iter()
            .map(|e| Weight::new(e.account, e.weight))
            .collect())
    }

    async fn stakeholders(&self, height: BlockNumber) -> Result<Vec<AccountId>, RpcError> {
        self.call("stake_getStakeholders", serde_json::json!([height]))
            .await
    }

    async fn accounts_in_state(
        &self,
        state: AccountState,
        height: BlockNumber,
    ) -> Result<Vec<AccountId>, RpcError> {
        self.call(
            "stake_getAccountsInState",
            serde_json::json!([state.as_str(), height]),
        )
        .await
    }

    async fn candidate_deposits(
        &self,
        height: BlockNumber,
    ) -> Result<Vec<(AccountId, Balance)>, RpcError> {
        let entries: Vec<DepositEntry> = self
            .call("stake_getCandidateDeposits", serde_json::json!([height]))
            .await?;
        Ok(entries.into_iter().map(|e| (e.account, e.deposit)).collect())
    }

    async fn best_block_number(&self) -> Result<BlockNumber, RpcError> {
        self.call("chain_getBestBlockNumber", serde_json::json!([]))
            .await
    }
}
