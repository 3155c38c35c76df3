// Settlement - What the chain pays out when a term closes
// Principle: penalties are exact integer formulas, reproduced literally
//
// Order at a boundary:
//   1. release deposits of accounts that left candidacy
//   2. confiscate banned rewards, penalise missed precommits
//   3. hand the reclaimed pool to the best proposers, group by group
//   4. roll the term ring forward (done by the driver)

use super::deposits::NominationDeposits;
use super::ledger::{LedgerAccumulator, LedgerError};
use super::term::{TermData, TermWindow, VoteTally};
use crate::types::{AccountId, AccountState, Balance, VoteCount};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Reward left after the missed-precommit penalty
///
/// ```text
/// missed*3 <= total   : reward * (10*total -  3*missed) / (10*total)
/// missed*2 <= total   : reward * (25*total - 48*missed) / (10*total)
/// missed*3 <= 2*total : reward * ( 4*total -  6*missed) / (10*total)
/// otherwise           : 0
/// ```
pub fn reward_after_penalty(
    missed: VoteCount,
    total: VoteCount,
    reward: Balance,
) -> Result<Balance, LedgerError> {
    if total == 0 {
        return Ok(reward);
    }
    let m = Balance::from(missed);
    let t = Balance::from(total);

    let numerator = if m * 3 <= t {
        10 * t - 3 * m
    } else if m * 2 <= t {
        25 * t - 48 * m
    } else if m * 3 <= 2 * t {
        4 * t - 6 * m
    } else {
        return Ok(0);
    };

    reward
        .checked_mul(numerator)
        .map(|scaled| scaled / (10 * t))
        .ok_or_else(|| LedgerError::Overflow(format!("penalty on reward {}", reward)))
}

/// Missed/proposed ratio as an exact fraction in lowest terms
///
/// `0/0` ranks as a perfect record, `m/0` with `m > 0` ranks last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissRatio {
    missed: u128,
    proposed: u128,
}

impl MissRatio {
    pub fn new(tally: VoteTally) -> Self {
        let (missed, proposed) = (u128::from(tally.missed), u128::from(tally.proposed));
        if proposed == 0 {
            return Self {
                missed: if missed == 0 { 0 } else { 1 },
                proposed: if missed == 0 { 1 } else { 0 },
            };
        }
        let g = gcd(missed, proposed);
        Self {
            missed: missed / g,
            proposed: proposed / g,
        }
    }
}

impl Ord for MissRatio {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.missed * other.proposed).cmp(&(other.missed * self.proposed))
    }
}

impl PartialOrd for MissRatio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Validators grouped by equal miss ratio, best group first
pub fn rank_validators(validators: &[AccountId], term: &TermData) -> Vec<Vec<AccountId>> {
    let mut ranked: Vec<(MissRatio, AccountId)> = validators
        .iter()
        .map(|v| (MissRatio::new(term.tally(v)), *v))
        .collect();
    ranked.sort();
    ranked.dedup();

    let mut groups: Vec<Vec<AccountId>> = Vec::new();
    let mut last: Option<MissRatio> = None;
    for (ratio, account) in ranked {
        match (last, groups.last_mut()) {
            (Some(prev), Some(group)) if prev == ratio => group.push(account),
            _ => groups.push(vec![account]),
        }
        last = Some(ratio);
    }
    groups
}

/// Share the reclaimed pool out group by group; returns the amount handed out
///
/// Each member of a group of size `k` receives `remaining / (k + 1)`. The
/// first group whose share would be zero stops the distribution, and whatever
/// is left stays undistributed.
pub fn give_additional_rewards(
    pool: Balance,
    groups: &[Vec<AccountId>],
    ledger: &mut LedgerAccumulator,
) -> Result<Balance, LedgerError> {
    let mut remaining = pool;
    for group in groups {
        let per_validator = remaining / (group.len() as Balance + 1);
        if per_validator == 0 {
            break;
        }
        for validator in group {
            ledger.deposit(*validator, per_validator)?;
            remaining -= per_validator;
        }
    }
    Ok(pool - remaining)
}

/// Accounts in each candidacy state at one height
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub banned: BTreeSet<AccountId>,
    pub candidates: BTreeSet<AccountId>,
    pub validators: BTreeSet<AccountId>,
    pub jailed: BTreeSet<AccountId>,
}

impl StateSnapshot {
    pub fn set_mut(&mut self, state: AccountState) -> &mut BTreeSet<AccountId> {
        match state {
            AccountState::Banned => &mut self.banned,
            AccountState::Candidate => &mut self.candidates,
            AccountState::Validator => &mut self.validators,
            AccountState::Jailed => &mut self.jailed,
        }
    }

    /// Accounts holding a nomination deposit in this snapshot
    pub fn nominees(&self) -> BTreeSet<AccountId> {
        self.candidates
            .iter()
            .chain(&self.validators)
            .chain(&self.jailed)
            .copied()
            .collect()
    }

    pub fn is_tracked(&self, account: &AccountId) -> bool {
        self.banned.contains(account)
            || self.candidates.contains(account)
            || self.validators.contains(account)
            || self.jailed.contains(account)
    }
}

/// Penalty applied to one outgoing validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Penalty {
    pub validator: AccountId,
    pub missed: VoteCount,
    pub reward: Balance,
    pub paid: Balance,
}

/// Everything a term boundary moved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementOutcome {
    /// Deposits refunded to accounts that left candidacy
    pub released: Vec<(AccountId, Balance)>,
    /// Deposits dropped because the account is banned
    pub confiscated_deposits: Vec<(AccountId, Balance)>,
    /// Rewards withheld from banned accounts
    pub banned_rewards: Vec<(AccountId, Balance)>,
    pub penalties: Vec<Penalty>,
    pub reclaimed: Balance,
    pub redistributed: Balance,
    /// True when the settled term was only partially observed
    pub partial: bool,
}

impl SettlementOutcome {
    /// Reclaimed reward nobody received
    pub fn undistributed(&self) -> Balance {
        self.reclaimed - self.redistributed
    }
}

/// Ledger of payouts at the boundary plus a summary of how it was built
#[derive(Debug, Clone)]
pub struct Settlement {
    pub ledger: LedgerAccumulator,
    pub outcome: SettlementOutcome,
}

/// Step 1: refund deposits of accounts that left candidacy, drop banned deposits
pub fn settle_nominations(
    before: &StateSnapshot,
    after: &StateSnapshot,
    deposits: &mut NominationDeposits,
    ledger: &mut LedgerAccumulator,
    outcome: &mut SettlementOutcome,
) -> Result<(), LedgerError> {
    for account in before.nominees() {
        if after.is_tracked(&account) {
            continue;
        }
        let amount = deposits.take(&account);
        if amount > 0 {
            ledger.deposit(account, amount)?;
            outcome.released.push((account, amount));
        }
    }

    for account in &after.banned {
        let amount = deposits.take(account);
        if amount > 0 {
            outcome.confiscated_deposits.push((*account, amount));
        }
    }
    Ok(())
}

/// Steps 1-3 for the generation whose rewards are paid at this boundary
///
/// `previous` is read, never modified: accrued rewards are taken from its
/// reward ledger while refunds and penalties land on a copy.
pub fn settle_term(
    previous: &TermData,
    window: Option<&TermWindow>,
    before: &StateSnapshot,
    after: &StateSnapshot,
    deposits: &mut NominationDeposits,
) -> Result<Settlement, LedgerError> {
    let mut ledger = previous.reward_ledger.clone();
    let mut outcome = SettlementOutcome::default();

    settle_nominations(before, after, deposits, &mut ledger, &mut outcome)?;

    let window = match window {
        Some(window) if previous.complete => window,
        _ => {
            outcome.partial = true;
            return Ok(Settlement { ledger, outcome });
        }
    };

    let accrued = &previous.reward_ledger;

    for account in &after.banned {
        let reward = accrued.deposited(account);
        if reward > 0 {
            ledger.withdraw(*account, reward)?;
            reclaim(&mut outcome, reward)?;
            outcome.banned_rewards.push((*account, reward));
        }
    }

    let total = window.block_count();
    let eligible: Vec<AccountId> = window
        .validators
        .iter()
        .filter(|v| !after.banned.contains(v))
        .copied()
        .collect();

    for validator in &eligible {
        let reward = accrued.deposited(validator);
        let missed = total.saturating_sub(previous.committed(validator));
        let paid = reward_after_penalty(missed, total, reward)?;
        if paid < reward {
            ledger.withdraw(*validator, reward - paid)?;
            reclaim(&mut outcome, reward - paid)?;
        }
        outcome.penalties.push(Penalty {
            validator: *validator,
            missed,
            reward,
            paid,
        });
    }

    let groups = rank_validators(&eligible, previous);
    outcome.redistributed = give_additional_rewards(outcome.reclaimed, &groups, &mut ledger)?;

    Ok(Settlement { ledger, outcome })
}

fn reclaim(outcome: &mut SettlementOutcome, amount: Balance) -> Result<(), LedgerError> {
    outcome.reclaimed = outcome
        .reclaimed
        .checked_add(amount)
        .ok_or_else(|| LedgerError::Overflow("reclaimed pool".into()))?;
    Ok(())
}
