// Classifier - Economic effect of each transaction in a block
// Principle: closed set of effects, unknown payloads cost only their fee

use super::deposits::NominationDeposits;
use super::ledger::{LedgerAccumulator, LedgerError};
use crate::codec::{decode_stake_action, ActionDecodeError, StakeAction};
use crate::types::{AccountId, Action, Balance, Block, BlockNumber, Transaction, TransactionKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Custom action handler id of the stake module
pub const DEFAULT_STAKE_HANDLER_ID: u64 = 2;

/// Minimum fee per transaction kind, loaded once from configuration
///
/// Stored as u64 so the table round-trips through TOML integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimumFees {
    pub pay: u64,
    pub set_regular_key: u64,
    pub create_shard: u64,
    pub set_shard_owners: u64,
    pub set_shard_users: u64,
    pub wrap_ccc: u64,
    pub store: u64,
    pub remove: u64,
    pub custom: u64,
    pub mint_asset: u64,
    pub transfer_asset: u64,
    pub change_asset_scheme: u64,
    pub increase_asset_supply: u64,
    pub unwrap_ccc: u64,
}

impl Default for MinimumFees {
    fn default() -> Self {
        Self {
            pay: 100,
            set_regular_key: 10_000,
            create_shard: 1_000_000,
            set_shard_owners: 100_000,
            set_shard_users: 10_000,
            wrap_ccc: 100_000,
            store: 5_000,
            remove: 5_000,
            custom: 0,
            mint_asset: 100_000,
            transfer_asset: 100,
            change_asset_scheme: 100_000,
            increase_asset_supply: 100_000,
            unwrap_ccc: 100,
        }
    }
}

impl MinimumFees {
    pub fn of(&self, kind: TransactionKind) -> Balance {
        let fee = match kind {
            TransactionKind::Pay => self.pay,
            TransactionKind::SetRegularKey => self.set_regular_key,
            TransactionKind::CreateShard => self.create_shard,
            TransactionKind::SetShardOwners => self.set_shard_owners,
            TransactionKind::SetShardUsers => self.set_shard_users,
            TransactionKind::WrapCcc => self.wrap_ccc,
            TransactionKind::Store => self.store,
            TransactionKind::Remove => self.remove,
            TransactionKind::Custom => self.custom,
            TransactionKind::MintAsset => self.mint_asset,
            TransactionKind::TransferAsset => self.transfer_asset,
            TransactionKind::ChangeAssetScheme => self.change_asset_scheme,
            TransactionKind::IncreaseAssetSupply => self.increase_asset_supply,
            TransactionKind::UnwrapCcc => self.unwrap_ccc,
        };
        Balance::from(fee)
    }
}

/// Native balance effect of a transaction, on top of its fee
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxEffect {
    /// Plain payment
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Balance,
    },
    /// Native currency wrapped into a shard asset
    Wrap { payer: AccountId, amount: Balance },
    /// Shard asset burnt back into native currency
    Unwrap { receiver: AccountId, amount: Balance },
    /// Additional candidacy deposit
    SelfNominate { candidate: AccountId, deposit: Balance },
    /// Offender's deposit goes to the reporter
    ReportDoubleVote {
        reporter: AccountId,
        height: BlockNumber,
        signer_index: usize,
    },
    /// Recognised action without native balance effect
    Neutral,
    /// Unrecognised or undecodable custom action
    Unknown,
}

/// A transaction reduced to its fee and effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedTx {
    pub signer: AccountId,
    pub fee: Balance,
    pub min_fee: Balance,
    pub effect: TxEffect,
}

/// Maps transactions to effects
#[derive(Debug, Clone)]
pub struct Classifier {
    fees: MinimumFees,
    stake_handler_id: u64,
}

impl Classifier {
    pub fn new(fees: MinimumFees, stake_handler_id: u64) -> Self {
        Self {
            fees,
            stake_handler_id,
        }
    }

    pub fn classify_block(&self, block: &Block) -> Vec<ClassifiedTx> {
        block
            .transactions
            .iter()
            .map(|tx| self.classify(tx, block.number))
            .collect()
    }

    pub fn classify(&self, tx: &Transaction, height: BlockNumber) -> ClassifiedTx {
        ClassifiedTx {
            signer: tx.signer,
            fee: tx.fee,
            min_fee: self.fees.of(tx.kind()),
            effect: self.effect(tx, height),
        }
    }

    fn effect(&self, tx: &Transaction, height: BlockNumber) -> TxEffect {
        match &tx.action {
            Action::Pay { receiver, quantity } => TxEffect::Transfer {
                from: tx.signer,
                to: *receiver,
                amount: Balance::from(*quantity),
            },
            Action::WrapCcc { payer, quantity } => TxEffect::Wrap {
                payer: *payer,
                amount: Balance::from(*quantity),
            },
            Action::UnwrapCcc { receiver, quantity } => TxEffect::Unwrap {
                receiver: *receiver,
                amount: Balance::from(*quantity),
            },
            Action::Custom { handler_id, bytes } if *handler_id == self.stake_handler_id => {
                self.stake_effect(tx.signer, bytes, height)
            }
            Action::Custom { handler_id, .. } => {
                debug!("Ignoring custom action for handler {} at #{}", handler_id, height);
                TxEffect::Unknown
            }
            _ => TxEffect::Neutral,
        }
    }

    fn stake_effect(&self, signer: AccountId, bytes: &[u8], height: BlockNumber) -> TxEffect {
        match decode_stake_action(bytes) {
            Ok(StakeAction::SelfNominate { deposit, .. }) => TxEffect::SelfNominate {
                candidate: signer,
                deposit: Balance::from(deposit),
            },
            Ok(StakeAction::ReportDoubleVote {
                height: reported,
                signer_index,
            }) => TxEffect::ReportDoubleVote {
                reporter: signer,
                height: reported,
                signer_index,
            },
            Ok(_) => TxEffect::Neutral,
            Err(ActionDecodeError::UnknownTag(tag)) => {
                debug!("Ignoring stake action with tag {:#04x} at #{}", tag, height);
                TxEffect::Unknown
            }
            Err(e) => {
                warn!("⚠️  Skipping undecodable stake action from {} at #{}: {}", signer, height, e);
                TxEffect::Unknown
            }
        }
    }
}

/// Heights whose rosters are needed to resolve double-vote offenders
pub fn report_heights(classified: &[ClassifiedTx]) -> BTreeSet<BlockNumber> {
    classified
        .iter()
        .filter_map(|tx| match tx.effect {
            TxEffect::ReportDoubleVote { height, .. } => Some(height),
            _ => None,
        })
        .collect()
}

/// Apply fees and effects to the block ledger, in block order
///
/// `rosters` maps each reported height to the validators that signed it.
pub fn apply_effects(
    classified: &[ClassifiedTx],
    rosters: &BTreeMap<BlockNumber, Vec<AccountId>>,
    ledger: &mut LedgerAccumulator,
    nominations: &mut NominationDeposits,
) -> Result<(), LedgerError> {
    for tx in classified {
        ledger.withdraw(tx.signer, tx.fee)?;
        ledger.collect(tx.fee, tx.min_fee)?;

        match &tx.effect {
            TxEffect::Transfer { from, to, amount } => {
                ledger.withdraw(*from, *amount)?;
                ledger.deposit(*to, *amount)?;
            }
            TxEffect::Wrap { payer, amount } => ledger.withdraw(*payer, *amount)?,
            TxEffect::Unwrap { receiver, amount } => ledger.deposit(*receiver, *amount)?,
            TxEffect::SelfNominate { candidate, deposit } => {
                ledger.withdraw(*candidate, *deposit)?;
                nominations.add(*candidate, *deposit)?;
            }
            TxEffect::ReportDoubleVote {
                reporter,
                height,
                signer_index,
            } => {
                let offender = rosters
                    .get(height)
                    .and_then(|roster| roster.get(*signer_index))
                    .copied();
                match offender {
                    Some(offender) => {
                        let confiscated = nominations.take(&offender);
                        debug!(
                            "Double vote by {} at #{} reported by {}, {} confiscated",
                            offender, height, reporter, confiscated
                        );
                        ledger.deposit(*reporter, confiscated)?;
                    }
                    None => warn!(
                        "⚠️  Double vote report for signer {} at #{} has no matching validator",
                        signer_index, height
                    ),
                }
            }
            TxEffect::Neutral | TxEffect::Unknown => {}
        }
    }
    Ok(())
}
