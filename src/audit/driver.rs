// Driver - Per-height reconciliation loop
// Principle: a height either commits completely or leaves no trace
//
// Per block in steady state:
//   1. classify transactions into the block ledger
//   2. record precommits (for the parent) and the author's seal
//   3. split fees, defer the author reward to the current term
//   4. at a term boundary settle the previous term and roll forward
//   5. compare expected balances against the chain, commit

use super::classifier::{apply_effects, report_heights, Classifier, MinimumFees};
use super::deposits::NominationDeposits;
use super::distributor::distribute;
use super::ledger::LedgerAccumulator;
use super::report::{AuditReport, Discrepancy, SubjectKind};
use super::settlement::{settle_term, Settlement, StateSnapshot};
use super::term::{is_term_changed, term_id, TermRing, TermWindow};
use super::AuditError;
use crate::codec::{decode_committed, decode_missing};
use crate::rpc::{ChainQuery, RpcError};
use crate::types::{AccountId, AccountState, Block, BlockNumber, Timestamp, VoteCount};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Chain parameters the audit depends on
#[derive(Debug, Clone)]
pub struct AuditSettings {
    pub term_seconds: u64,
    pub stake_handler_id: u64,
    pub minimum_fees: MinimumFees,
}

/// Everything carried from one height to the next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditorState {
    pub parent_height: BlockNumber,
    pub parent_timestamp: Timestamp,

    /// Previous (settling) and current (accumulating) generations
    pub terms: TermRing,

    /// Window of the generation in `terms.previous()`
    pub previous_window: Option<TermWindow>,

    /// First block of the term in progress
    pub current_window_start: BlockNumber,

    /// Roster of the term in progress, signer-index order
    pub current_validators: Vec<AccountId>,

    pub nominations: NominationDeposits,
}

impl AuditorState {
    /// Roster that signed `height`, and whether it belongs to the previous generation
    fn roster_for(&self, height: BlockNumber) -> (bool, &[AccountId]) {
        match &self.previous_window {
            Some(window) if window.contains(height) => (true, window.validators.as_slice()),
            _ => (false, self.current_validators.as_slice()),
        }
    }
}

/// Reconciles one chain, height by height
pub struct Auditor<C: ChainQuery> {
    chain: C,
    settings: AuditSettings,
    classifier: Classifier,
    state: Option<AuditorState>,
}

impl<C: ChainQuery> Auditor<C> {
    pub fn new(chain: C, settings: AuditSettings) -> Result<Self, AuditError> {
        if settings.term_seconds == 0 {
            return Err(AuditError::Settings("term_seconds must be positive".into()));
        }
        let classifier = Classifier::new(settings.minimum_fees.clone(), settings.stake_handler_id);
        Ok(Self {
            chain,
            settings,
            classifier,
            state: None,
        })
    }

    /// Resume from a persisted state instead of cold-starting
    pub fn with_state(mut self, state: AuditorState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    pub fn state(&self) -> Option<&AuditorState> {
        self.state.as_ref()
    }

    /// Next height to audit, `None` before the cold start
    pub fn next_height(&self) -> Option<BlockNumber> {
        self.state.as_ref().map(|s| s.parent_height + 1)
    }

    /// Audit `height`; the first call seeds state from that block instead
    pub async fn audit_height(&mut self, height: BlockNumber) -> Result<AuditReport, AuditError> {
        let mut state = match self.state.clone() {
            Some(state) => state,
            None => {
                let (state, report) = self.cold_start(height).await?;
                self.state = Some(state);
                return Ok(report);
            }
        };

        if height != state.parent_height + 1 {
            return Err(AuditError::OutOfOrder {
                expected: state.parent_height + 1,
                actual: height,
            });
        }

        let report = self.process(&mut state, height).await?;
        self.state = Some(state);
        Ok(report)
    }

    async fn cold_start(&self, height: BlockNumber) -> Result<(AuditorState, AuditReport), AuditError> {
        let (block, validators, deposits) = tokio::try_join!(
            self.chain.block(height),
            self.chain.accounts_in_state(AccountState::Validator, height),
            self.chain.candidate_deposits(height),
        )?;

        info!(
            "🧊 Cold start at #{}: {} validators, {} nomination deposits",
            height,
            validators.len(),
            deposits.len()
        );

        let state = AuditorState {
            parent_height: height,
            parent_timestamp: block.timestamp,
            terms: TermRing::cold(),
            previous_window: None,
            current_window_start: height + 1,
            current_validators: validators,
            nominations: NominationDeposits::from_snapshot(deposits)?,
        };
        let report = AuditReport {
            height,
            term: term_id(block.timestamp, self.settings.term_seconds),
            skipped: true,
            ..AuditReport::default()
        };
        Ok((state, report))
    }

    async fn process(&self, state: &mut AuditorState, height: BlockNumber) -> Result<AuditReport, AuditError> {
        let parent = state.parent_height;
        let block = self.chain.block(height).await?;
        if block.number != height {
            return Err(AuditError::Invariant {
                height,
                reason: format!("node returned block #{}", block.number),
            });
        }

        let term_seconds = self.settings.term_seconds;
        let boundary = is_term_changed(block.timestamp, state.parent_timestamp, term_seconds);
        let term = term_id(block.timestamp, term_seconds);

        let classified = self.classifier.classify_block(&block);
        let reported = report_heights(&classified);

        let (weights, stakeholders, rosters, snapshots) = tokio::try_join!(
            self.chain.weights(height),
            self.chain.stakeholders(height),
            self.rosters_at(reported.into_iter().collect()),
            self.boundary_snapshots(parent, height, boundary),
        )?;

        // 1. transactions
        let mut block_ledger = LedgerAccumulator::new();
        apply_effects(&classified, &rosters, &mut block_ledger, &mut state.nominations)?;

        // 2. votes
        self.record_votes(state, &block)?;

        // 3. fees
        let distribution = distribute(
            block_ledger.total_fee(),
            block_ledger.total_min_fee(),
            &weights,
            block.author,
        )?;
        for (stakeholder, share) in &distribution.shares {
            block_ledger.deposit(*stakeholder, *share)?;
        }
        debug!(
            "#{} fees: {} to stakeholders, {} deferred for {}",
            height,
            distribution.distributed_to_stakeholders(),
            distribution.author_reward,
            distribution.author
        );
        let current = state.terms.current_mut();
        current
            .reward_ledger
            .deposit(distribution.author, distribution.author_reward)?;
        current
            .reward_ledger
            .collect(block_ledger.total_fee(), block_ledger.total_min_fee())?;

        // 4. settlement
        let mut subjects: BTreeMap<AccountId, SubjectKind> = BTreeMap::new();
        subjects.insert(block.author, SubjectKind::Author);

        let mut audit_ledger = block_ledger;
        let mut settlement_outcome = None;
        let mut skipped = false;

        if let Some((before, after, next_roster)) = snapshots {
            let settlement = self.settle(state, height, &before, &after)?;
            audit_ledger.merge(&settlement.ledger)?;
            skipped = settlement.outcome.partial;

            if let Some(window) = &state.previous_window {
                for validator in &window.validators {
                    subjects.entry(*validator).or_insert(SubjectKind::Validator);
                }
            }
            for (released, _) in &settlement.outcome.released {
                subjects.entry(*released).or_insert(SubjectKind::Validator);
            }

            self.roll_forward(state, height, next_roster);
            info!(
                "🔄 Term closed at #{} (now term {}): reclaimed {}, redistributed {}, undistributed {}, {} deposits released",
                height,
                term,
                settlement.outcome.reclaimed,
                settlement.outcome.redistributed,
                settlement.outcome.undistributed(),
                settlement.outcome.released.len()
            );
            settlement_outcome = Some(settlement.outcome);
        }

        let holders = stakeholders.iter().chain(weights.iter().map(|w| &w.account));
        for stakeholder in holders {
            subjects.entry(*stakeholder).or_insert(SubjectKind::Stakeholder);
        }

        // 5. comparison
        let discrepancies = if skipped {
            warn!("⚠️  Skipping balance audit at #{}: settled term was only partially observed", height);
            Vec::new()
        } else {
            self.compare(&audit_ledger, &subjects, parent, height, term).await?
        };

        state.parent_height = height;
        state.parent_timestamp = block.timestamp;

        let audited = if skipped { 0 } else { subjects.len() };
        debug!(
            "✅ #{} audited {} accounts, {} discrepancies",
            height,
            audited,
            discrepancies.len()
        );

        Ok(AuditReport {
            height,
            term,
            audited,
            discrepancies,
            settlement: settlement_outcome,
            skipped,
        })
    }

    /// Credit precommits for the parent and charge this block's author for the absent ones
    fn record_votes(&self, state: &mut AuditorState, block: &Block) -> Result<(), AuditError> {
        let voted = block.number - 1;
        let (in_previous, roster) = state.roster_for(voted);
        let signers: Vec<AccountId> = decode_committed(&block.precommit_bitset, roster.len())?
            .into_iter()
            .map(|index| roster[index])
            .collect();
        let missing = decode_missing(&block.precommit_bitset, roster.len())?.len() as VoteCount;

        let generation = if in_previous {
            state.terms.previous_mut()
        } else {
            state.terms.current_mut()
        };
        for signer in signers {
            generation.record_commit(signer);
        }

        if missing > 0 {
            debug!("#{} sealed by {} with {} precommits missing", block.number, block.author, missing);
        }
        state.terms.current_mut().record_proposal(block.author, missing);
        Ok(())
    }

    fn settle(
        &self,
        state: &mut AuditorState,
        height: BlockNumber,
        before: &StateSnapshot,
        after: &StateSnapshot,
    ) -> Result<Settlement, AuditError> {
        let previous = state.terms.previous();
        if previous.complete && state.previous_window.is_none() {
            return Err(AuditError::Invariant {
                height,
                reason: "complete previous term has no window".into(),
            });
        }

        let settlement = settle_term(
            previous,
            state.previous_window.as_ref(),
            before,
            after,
            &mut state.nominations,
        )?;

        for (account, amount) in &settlement.outcome.banned_rewards {
            info!("🔨 Banned {} forfeits reward {}", account, amount);
        }
        for (account, amount) in &settlement.outcome.confiscated_deposits {
            info!("🔨 Banned {} forfeits deposit {}", account, amount);
        }
        Ok(settlement)
    }

    /// `previous := current`, fresh `current`, window of the closed term recorded
    fn roll_forward(&self, state: &mut AuditorState, height: BlockNumber, next_roster: Vec<AccountId>) {
        let closed = TermWindow {
            first_block: state.current_window_start,
            last_block: height,
            validators: std::mem::replace(&mut state.current_validators, next_roster),
        };
        state.previous_window = Some(closed);
        state.current_window_start = height + 1;
        state.terms.rotate();
    }

    async fn compare(
        &self,
        ledger: &LedgerAccumulator,
        subjects: &BTreeMap<AccountId, SubjectKind>,
        parent: BlockNumber,
        height: BlockNumber,
        term: u64,
    ) -> Result<Vec<Discrepancy>, AuditError> {
        let lookups = subjects.keys().map(|account| async move {
            tokio::try_join!(
                self.chain.balance(*account, parent),
                self.chain.balance(*account, height)
            )
        });
        let balances = try_join_all(lookups).await?;

        let mut discrepancies = Vec::new();
        for ((account, subject), (before, actual)) in subjects.iter().zip(balances) {
            let expected = ledger.adjust(account, before)?;
            if expected != actual {
                discrepancies.push(Discrepancy {
                    subject: *subject,
                    account: *account,
                    expected,
                    actual,
                    height,
                    term,
                });
            }
        }
        Ok(discrepancies)
    }

    /// Validators that signed each reported height
    async fn rosters_at(
        &self,
        heights: Vec<BlockNumber>,
    ) -> Result<BTreeMap<BlockNumber, Vec<AccountId>>, RpcError> {
        let lookups = heights.into_iter().map(|reported| async move {
            let roster = self
                .chain
                .accounts_in_state(AccountState::Validator, reported.saturating_sub(1))
                .await?;
            Ok::<_, RpcError>((reported, roster))
        });
        Ok(try_join_all(lookups).await?.into_iter().collect())
    }

    /// State snapshots at parent and block, plus the incoming roster
    async fn boundary_snapshots(
        &self,
        parent: BlockNumber,
        height: BlockNumber,
        boundary: bool,
    ) -> Result<Option<(StateSnapshot, StateSnapshot, Vec<AccountId>)>, RpcError> {
        if !boundary {
            return Ok(None);
        }
        let ((before, _), (after, roster)) =
            tokio::try_join!(self.snapshot(parent), self.snapshot(height))?;
        Ok(Some((before, after, roster)))
    }

    async fn snapshot(&self, height: BlockNumber) -> Result<(StateSnapshot, Vec<AccountId>), RpcError> {
        let lookups = AccountState::ALL.into_iter().map(|state| async move {
            let accounts = self.chain.accounts_in_state(state, height).await?;
            Ok::<_, RpcError>((state, accounts))
        });

        let mut snapshot = StateSnapshot::default();
        let mut validators = Vec::new();
        for (state, accounts) in try_join_all(lookups).await? {
            if state == AccountState::Validator {
                validators = accounts.clone();
            }
            snapshot.set_mut(state).extend(accounts);
        }
        Ok((snapshot, validators))
    }
}
