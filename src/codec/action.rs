// Action - Stake handler custom action payloads
// Principle: decode only what moves native balance, name everything else

use crate::types::{AccountId, BlockNumber};
use rlp::Rlp;

pub const TAG_TRANSFER_CCS: u8 = 1;
pub const TAG_DELEGATE_CCS: u8 = 2;
pub const TAG_REVOKE: u8 = 3;
pub const TAG_SELF_NOMINATE: u8 = 4;
pub const TAG_REPORT_DOUBLE_VOTE: u8 = 5;
pub const TAG_REDELEGATE: u8 = 6;
pub const TAG_CHANGE_PARAMS: u8 = 0xff;

/// Stake handler actions, `[tag, ...fields]` on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakeAction {
    TransferCcs {
        receiver: AccountId,
        quantity: u64,
    },
    DelegateCcs {
        delegatee: AccountId,
        quantity: u64,
    },
    Revoke {
        delegatee: AccountId,
        quantity: u64,
    },
    Redelegate {
        prev_delegatee: AccountId,
        next_delegatee: AccountId,
        quantity: u64,
    },
    /// Adds `deposit` on top of the signer's existing candidacy deposit
    SelfNominate {
        deposit: u64,
        metadata: Vec<u8>,
    },
    /// Two conflicting precommits from the validator at `signer_index`
    /// of the roster that signed `height`
    ReportDoubleVote {
        height: BlockNumber,
        signer_index: usize,
    },
    ChangeParams {
        metadata_seq: u64,
    },
}

impl StakeAction {
    pub fn tag(&self) -> u8 {
        match self {
            StakeAction::TransferCcs { .. } => TAG_TRANSFER_CCS,
            StakeAction::DelegateCcs { .. } => TAG_DELEGATE_CCS,
            StakeAction::Revoke { .. } => TAG_REVOKE,
            StakeAction::Redelegate { .. } => TAG_REDELEGATE,
            StakeAction::SelfNominate { .. } => TAG_SELF_NOMINATE,
            StakeAction::ReportDoubleVote { .. } => TAG_REPORT_DOUBLE_VOTE,
            StakeAction::ChangeParams { .. } => TAG_CHANGE_PARAMS,
        }
    }
}

/// Custom action decoding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionDecodeError {
    #[error("Malformed RLP: {0}")]
    Rlp(String),

    #[error("Empty action payload")]
    Empty,

    #[error("Unknown stake action tag: {0:#04x}")]
    UnknownTag(u8),

    #[error("Action {tag:#04x} expects {expected} items, got {actual}")]
    FieldCount {
        tag: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid account id in action payload")]
    InvalidAccount,

    #[error("Double vote messages disagree: {0}")]
    InconsistentReport(&'static str),
}

impl From<rlp::DecoderError> for ActionDecodeError {
    fn from(e: rlp::DecoderError) -> Self {
        ActionDecodeError::Rlp(e.to_string())
    }
}

/// Decode a stake handler payload
pub fn decode_stake_action(bytes: &[u8]) -> Result<StakeAction, ActionDecodeError> {
    if bytes.is_empty() {
        return Err(ActionDecodeError::Empty);
    }

    let rlp = Rlp::new(bytes);
    let count = rlp.item_count()?;
    if count == 0 {
        return Err(ActionDecodeError::Empty);
    }

    let tag: u8 = rlp.val_at(0)?;
    match tag {
        TAG_TRANSFER_CCS => {
            expect_items(tag, count, 3)?;
            Ok(StakeAction::TransferCcs {
                receiver: account_at(&rlp, 1)?,
                quantity: rlp.val_at(2)?,
            })
        }
        TAG_DELEGATE_CCS => {
            expect_items(tag, count, 3)?;
            Ok(StakeAction::DelegateCcs {
                delegatee: account_at(&rlp, 1)?,
                quantity: rlp.val_at(2)?,
            })
        }
        TAG_REVOKE => {
            expect_items(tag, count, 3)?;
            Ok(StakeAction::Revoke {
                delegatee: account_at(&rlp, 1)?,
                quantity: rlp.val_at(2)?,
            })
        }
        TAG_REDELEGATE => {
            expect_items(tag, count, 4)?;
            Ok(StakeAction::Redelegate {
                prev_delegatee: account_at(&rlp, 1)?,
                next_delegatee: account_at(&rlp, 2)?,
                quantity: rlp.val_at(3)?,
            })
        }
        TAG_SELF_NOMINATE => {
            expect_items(tag, count, 3)?;
            Ok(StakeAction::SelfNominate {
                deposit: rlp.val_at(1)?,
                metadata: rlp.val_at(2)?,
            })
        }
        TAG_REPORT_DOUBLE_VOTE => {
            expect_items(tag, count, 3)?;
            let first: Vec<u8> = rlp.val_at(1)?;
            let second: Vec<u8> = rlp.val_at(2)?;
            let (height, signer_index) = vote_origin(&first)?;
            let (other_height, other_index) = vote_origin(&second)?;
            if height != other_height {
                return Err(ActionDecodeError::InconsistentReport("heights differ"));
            }
            if signer_index != other_index {
                return Err(ActionDecodeError::InconsistentReport("signers differ"));
            }
            Ok(StakeAction::ReportDoubleVote {
                height,
                signer_index,
            })
        }
        TAG_CHANGE_PARAMS => {
            if count < 3 {
                return Err(ActionDecodeError::FieldCount {
                    tag,
                    expected: 3,
                    actual: count,
                });
            }
            Ok(StakeAction::ChangeParams {
                metadata_seq: rlp.val_at(1)?,
            })
        }
        other => Err(ActionDecodeError::UnknownTag(other)),
    }
}

fn expect_items(tag: u8, actual: usize, expected: usize) -> Result<(), ActionDecodeError> {
    if actual != expected {
        return Err(ActionDecodeError::FieldCount {
            tag,
            expected,
            actual,
        });
    }
    Ok(())
}

fn account_at(rlp: &Rlp, index: usize) -> Result<AccountId, ActionDecodeError> {
    let raw: Vec<u8> = rlp.val_at(index)?;
    AccountId::from_slice(&raw).ok_or(ActionDecodeError::InvalidAccount)
}

/// `(height, signer_index)` of an encoded consensus message
///
/// Layout: `[[[height, view, step], block_hash], signature, signer_index]`
fn vote_origin(message: &[u8]) -> Result<(BlockNumber, usize), ActionDecodeError> {
    let rlp = Rlp::new(message);
    let height: u64 = rlp.at(0)?.at(0)?.val_at(0)?;
    let signer_index: u64 = rlp.val_at(2)?;
    Ok((height, signer_index as usize))
}
