// Mock Chain - In-memory chain for driver tests
//
// Balances, weights, states and deposits carry forward: a value set at
// height h holds for every later height until overwritten.

use crate::audit::{AuditSettings, MinimumFees, DEFAULT_STAKE_HANDLER_ID};
use crate::codec::encode_bitset;
use crate::rpc::{ChainQuery, RpcError};
use crate::types::{
    AccountId, AccountState, Action, Balance, Block, BlockNumber, Timestamp, Transaction, Weight,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

pub fn account(n: u8) -> AccountId {
    AccountId::from_bytes([n; 20])
}

pub fn settings(term_seconds: u64) -> AuditSettings {
    AuditSettings {
        term_seconds,
        stake_handler_id: DEFAULT_STAKE_HANDLER_ID,
        minimum_fees: MinimumFees::default(),
    }
}

/// Block with a precommit bitset over a roster of `roster_len`
pub fn block(
    number: BlockNumber,
    author: AccountId,
    timestamp: Timestamp,
    committed: &[usize],
    roster_len: usize,
    transactions: Vec<Transaction>,
) -> Block {
    Block {
        number,
        author,
        timestamp,
        precommit_bitset: encode_bitset(committed, roster_len),
        transactions,
    }
}

pub fn pay(signer: AccountId, fee: Balance, receiver: AccountId, quantity: u64) -> Transaction {
    Transaction {
        signer,
        fee,
        action: Action::Pay { receiver, quantity },
    }
}

pub fn stake_action(signer: AccountId, fee: Balance, bytes: Vec<u8>) -> Transaction {
    Transaction {
        signer,
        fee,
        action: Action::Custom {
            handler_id: DEFAULT_STAKE_HANDLER_ID,
            bytes,
        },
    }
}

/// Accounts per candidacy state
#[derive(Debug, Clone, Default)]
pub struct StateTable {
    pub banned: Vec<AccountId>,
    pub candidates: Vec<AccountId>,
    pub validators: Vec<AccountId>,
    pub jailed: Vec<AccountId>,
}

impl StateTable {
    fn get(&self, state: AccountState) -> Vec<AccountId> {
        match state {
            AccountState::Banned => self.banned.clone(),
            AccountState::Candidate => self.candidates.clone(),
            AccountState::Validator => self.validators.clone(),
            AccountState::Jailed => self.jailed.clone(),
        }
    }
}

#[derive(Default)]
pub struct MockChain {
    blocks: BTreeMap<BlockNumber, Block>,
    balances: BTreeMap<AccountId, BTreeMap<BlockNumber, Balance>>,
    weights: BTreeMap<BlockNumber, Vec<Weight>>,
    states: BTreeMap<BlockNumber, StateTable>,
    deposits: BTreeMap<BlockNumber, Vec<(AccountId, Balance)>>,
    /// Transient failures left for block queries
    block_failures: AtomicU32,
    /// Transient failures left for balance queries
    balance_failures: AtomicU32,
}

fn carried<T: Clone + Default>(map: &BTreeMap<BlockNumber, T>, height: BlockNumber) -> T {
    map.range(..=height)
        .next_back()
        .map(|(_, value)| value.clone())
        .unwrap_or_default()
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&mut self, block: Block) {
        self.blocks.insert(block.number, block);
    }

    pub fn set_balance(&mut self, account: AccountId, height: BlockNumber, balance: Balance) {
        self.balances.entry(account).or_default().insert(height, balance);
    }

    pub fn set_weights(&mut self, height: BlockNumber, weights: Vec<Weight>) {
        self.weights.insert(height, weights);
    }

    pub fn set_states(&mut self, height: BlockNumber, states: StateTable) {
        self.states.insert(height, states);
    }

    pub fn set_deposits(&mut self, height: BlockNumber, deposits: Vec<(AccountId, Balance)>) {
        self.deposits.insert(height, deposits);
    }

    pub fn fail_block_queries(&self, times: u32) {
        self.block_failures.store(times, Ordering::SeqCst);
    }

    pub fn fail_balance_queries(&self, times: u32) {
        self.balance_failures.store(times, Ordering::SeqCst);
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ChainQuery for MockChain {
    async fn block(&self, height: BlockNumber) -> Result<Block, RpcError> {
        if Self::take_failure(&self.block_failures) {
            return Err(RpcError::Network("connection reset".into()));
        }
        self.blocks
            .get(&height)
            .cloned()
            .ok_or(RpcError::BlockNotFound(height))
    }

    async fn balance(&self, account: AccountId, height: BlockNumber) -> Result<Balance, RpcError> {
        if Self::take_failure(&self.balance_failures) {
            return Err(RpcError::Timeout("balance".into()));
        }
        Ok(self
            .balances
            .get(&account)
            .map(|history| carried(history, height))
            .unwrap_or(0))
    }

    async fn weights(&self, height: BlockNumber) -> Result<Vec<Weight>, RpcError> {
        Ok(carried(&self.weights, height))
    }

    async fn stakeholders(&self, height: BlockNumber) -> Result<Vec<AccountId>, RpcError> {
        Ok(carried(&self.weights, height)
            .into_iter()
            .map(|w| w.account)
            .collect())
    }

    async fn accounts_in_state(
        &self,
        state: AccountState,
        height: BlockNumber,
    ) -> Result<Vec<AccountId>, RpcError> {
        Ok(carried(&self.states, height).get(state))
    }

    async fn candidate_deposits(
        &self,
        height: BlockNumber,
    ) -> Result<Vec<(AccountId, Balance)>, RpcError> {
        Ok(carried(&self.deposits, height))
    }

    async fn best_block_number(&self) -> Result<BlockNumber, RpcError> {
        Ok(self.blocks.keys().next_back().copied().unwrap_or(0))
    }
}

#[tokio::test]
async fn test_mock_carries_values_forward() {
    let mut chain = MockChain::new();
    chain.set_balance(account(1), 5, 100);
    chain.set_balance(account(1), 8, 40);

    assert_eq!(chain.balance(account(1), 4).await.unwrap(), 0);
    assert_eq!(chain.balance(account(1), 7).await.unwrap(), 100);
    assert_eq!(chain.balance(account(1), 9).await.unwrap(), 40);

    chain.fail_balance_queries(1);
    assert!(chain.balance(account(1), 9).await.is_err());
    assert!(chain.balance(account(1), 9).await.is_ok());
}
