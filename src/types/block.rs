// Block - Externally observed block bodies
use super::primitives::{AccountId, Balance, BlockNumber, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A block as reported by the chain node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Height
    pub number: BlockNumber,

    /// Block author (proposer)
    pub author: AccountId,

    /// Block timestamp (seconds)
    pub timestamp: Timestamp,

    /// RLP-encoded precommit bitset for the parent block
    #[serde(with = "hex_bytes")]
    pub precommit_bitset: Vec<u8>,

    /// Transactions in block order
    pub transactions: Vec<Transaction>,
}

/// A signed transaction, reduced to what affects balances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Fee payer
    pub signer: AccountId,

    /// Fee actually paid
    pub fee: Balance,

    /// Action carried by the transaction
    pub action: Action,
}

impl Transaction {
    pub fn kind(&self) -> TransactionKind {
        self.action.kind()
    }
}

/// Transaction actions
///
/// Quantities are 64-bit on chain. Kinds that never move native balance
/// beyond the fee carry no fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Pay {
        receiver: AccountId,
        quantity: u64,
    },
    WrapCcc {
        payer: AccountId,
        quantity: u64,
    },
    UnwrapCcc {
        receiver: AccountId,
        quantity: u64,
    },
    #[serde(rename_all = "camelCase")]
    Custom {
        handler_id: u64,
        #[serde(with = "hex_bytes")]
        bytes: Vec<u8>,
    },
    SetRegularKey {},
    CreateShard {},
    SetShardOwners {},
    SetShardUsers {},
    Store {},
    Remove {},
    MintAsset {},
    TransferAsset {},
    ChangeAssetScheme {},
    IncreaseAssetSupply {},
}

impl Action {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Action::Pay { .. } => TransactionKind::Pay,
            Action::WrapCcc { .. } => TransactionKind::WrapCcc,
            Action::UnwrapCcc { .. } => TransactionKind::UnwrapCcc,
            Action::Custom { .. } => TransactionKind::Custom,
            Action::SetRegularKey {} => TransactionKind::SetRegularKey,
            Action::CreateShard {} => TransactionKind::CreateShard,
            Action::SetShardOwners {} => TransactionKind::SetShardOwners,
            Action::SetShardUsers {} => TransactionKind::SetShardUsers,
            Action::Store {} => TransactionKind::Store,
            Action::Remove {} => TransactionKind::Remove,
            Action::MintAsset {} => TransactionKind::MintAsset,
            Action::TransferAsset {} => TransactionKind::TransferAsset,
            Action::ChangeAssetScheme {} => TransactionKind::ChangeAssetScheme,
            Action::IncreaseAssetSupply {} => TransactionKind::IncreaseAssetSupply,
        }
    }
}

/// Transaction kinds, keyed by the minimum fee table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionKind {
    Pay,
    SetRegularKey,
    CreateShard,
    SetShardOwners,
    SetShardUsers,
    WrapCcc,
    Store,
    Remove,
    Custom,
    MintAsset,
    TransferAsset,
    ChangeAssetScheme,
    IncreaseAssetSupply,
    UnwrapCcc,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Hex (de)serialization for raw byte fields
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let hex_str = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(hex_str).map_err(serde::de::Error::custom)
    }
}
