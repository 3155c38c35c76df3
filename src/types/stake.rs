// Stake - Stake-handler state snapshots
use super::primitives::{AccountId, Balance};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Candidacy states tracked by the stake handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountState {
    /// Proven double voter, deposit confiscated
    Banned,
    /// Nominated, waiting for election
    Candidate,
    /// Elected for the current term
    Validator,
    /// Temporarily excluded for poor performance, deposit held
    Jailed,
}

impl AccountState {
    pub const ALL: [AccountState; 4] = [
        AccountState::Banned,
        AccountState::Candidate,
        AccountState::Validator,
        AccountState::Jailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountState::Banned => "Banned",
            AccountState::Candidate => "Candidate",
            AccountState::Validator => "Validator",
            AccountState::Jailed => "Jailed",
        }
    }
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Voting power of a stakeholder at one height (own stake plus delegations)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weight {
    pub account: AccountId,
    pub weight: Balance,
}

impl Weight {
    pub fn new(account: AccountId, weight: Balance) -> Self {
        Self { account, weight }
    }
}
