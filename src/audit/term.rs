// Term - Per-term reward and vote bookkeeping
// Principle: rewards of a term settle one term later, so two generations live at once

use super::ledger::LedgerAccumulator;
use crate::types::{AccountId, BlockNumber, TermId, Timestamp, VoteCount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Term a timestamp falls into
pub fn term_id(timestamp: Timestamp, term_seconds: u64) -> TermId {
    timestamp / term_seconds
}

/// Whether the block at `timestamp` closes the term its parent belongs to
pub fn is_term_changed(timestamp: Timestamp, parent_timestamp: Timestamp, term_seconds: u64) -> bool {
    term_id(timestamp, term_seconds) != term_id(parent_timestamp, term_seconds)
}

/// Proposal record of a validator as block author
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub missed: VoteCount,
    pub proposed: VoteCount,
}

/// One term generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermData {
    /// Author rewards deferred to the next term boundary
    pub reward_ledger: LedgerAccumulator,

    /// Blocks each validator precommitted
    pub committed_votes: BTreeMap<AccountId, VoteCount>,

    /// Missed and successful proposals per author
    pub author_votes: BTreeMap<AccountId, VoteTally>,

    /// False when the term started before the auditor's first block
    pub complete: bool,
}

impl TermData {
    pub fn new() -> Self {
        Self {
            reward_ledger: LedgerAccumulator::new(),
            committed_votes: BTreeMap::new(),
            author_votes: BTreeMap::new(),
            complete: true,
        }
    }

    /// A generation whose beginning was never observed
    pub fn partial() -> Self {
        Self {
            complete: false,
            ..Self::new()
        }
    }

    pub fn record_commit(&mut self, validator: AccountId) {
        *self.committed_votes.entry(validator).or_insert(0) += 1;
    }

    /// One sealed block; `missing` precommits were absent from its seal
    pub fn record_proposal(&mut self, author: AccountId, missing: VoteCount) {
        let tally = self.author_votes.entry(author).or_default();
        tally.proposed += 1;
        tally.missed += missing;
    }

    pub fn committed(&self, validator: &AccountId) -> VoteCount {
        self.committed_votes.get(validator).copied().unwrap_or(0)
    }

    pub fn tally(&self, validator: &AccountId) -> VoteTally {
        self.author_votes.get(validator).copied().unwrap_or_default()
    }
}

impl Default for TermData {
    fn default() -> Self {
        Self::new()
    }
}

/// Block range and roster of a closed term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermWindow {
    pub first_block: BlockNumber,
    pub last_block: BlockNumber,
    /// Roster in signer-index order
    pub validators: Vec<AccountId>,
}

impl TermWindow {
    pub fn block_count(&self) -> VoteCount {
        self.last_block.saturating_sub(self.first_block) + 1
    }

    pub fn contains(&self, block: BlockNumber) -> bool {
        block >= self.first_block && block <= self.last_block
    }
}

/// Two-slot ring of term generations: `previous` (settling) and `current` (accumulating)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRing {
    slots: [TermData; 2],
    head: usize,
}

impl TermRing {
    pub fn new(previous: TermData, current: TermData) -> Self {
        Self {
            slots: [previous, current],
            head: 1,
        }
    }

    /// Both generations started before the first observed block
    pub fn cold() -> Self {
        Self::new(TermData::partial(), TermData::partial())
    }

    pub fn current(&self) -> &TermData {
        &self.slots[self.head]
    }

    pub fn current_mut(&mut self) -> &mut TermData {
        &mut self.slots[self.head]
    }

    pub fn previous(&self) -> &TermData {
        &self.slots[self.head ^ 1]
    }

    pub fn previous_mut(&mut self) -> &mut TermData {
        &mut self.slots[self.head ^ 1]
    }

    /// `previous := current`, `current := fresh`; returns the settled generation
    pub fn rotate(&mut self) -> TermData {
        self.head ^= 1;
        std::mem::replace(&mut self.slots[self.head], TermData::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(n: u8) -> AccountId {
        AccountId::from_bytes([n; 20])
    }

    #[test]
    fn test_term_change_detection() {
        assert!(!is_term_changed(3_599, 3_500, 3_600));
        assert!(is_term_changed(3_600, 3_599, 3_600));
        assert!(is_term_changed(7_300, 3_000, 3_600));
        assert_eq!(term_id(7_300, 3_600), 2);
    }

    #[test]
    fn test_vote_recording() {
        let mut term = TermData::new();
        term.record_commit(account(1));
        term.record_commit(account(1));
        term.record_proposal(account(2), 1);
        term.record_proposal(account(3), 0);
        term.record_proposal(account(3), 2);

        assert_eq!(term.committed(&account(1)), 2);
        assert_eq!(term.committed(&account(2)), 0);
        assert_eq!(term.tally(&account(2)), VoteTally { missed: 1, proposed: 1 });
        assert_eq!(term.tally(&account(3)), VoteTally { missed: 2, proposed: 2 });
        assert_eq!(term.tally(&account(4)), VoteTally::default());
    }

    #[test]
    fn test_window() {
        let window = TermWindow {
            first_block: 101,
            last_block: 200,
            validators: vec![account(1)],
        };
        assert_eq!(window.block_count(), 100);
        assert!(window.contains(101));
        assert!(window.contains(200));
        assert!(!window.contains(201));
        assert!(!window.contains(100));
    }

    #[test]
    fn test_ring_rotation() {
        let mut ring = TermRing::cold();
        assert!(!ring.previous().complete);
        assert!(!ring.current().complete);

        ring.current_mut().record_commit(account(1));
        ring.current_mut().reward_ledger.deposit(account(1), 10).unwrap();

        let settled = ring.rotate();
        assert!(!settled.complete);
        assert_eq!(ring.previous().committed(&account(1)), 1);
        assert_eq!(ring.previous().reward_ledger.deposited(&account(1)), 10);
        assert_eq!(ring.current(), &TermData::new());
        assert!(ring.current().complete);

        ring.current_mut().record_commit(account(2));
        ring.rotate();
        assert_eq!(ring.previous().committed(&account(2)), 1);
        assert_eq!(ring.previous().committed(&account(1)), 0);
    }
}
