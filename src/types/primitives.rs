// Primitives - Fundamental types shared by every audit stage
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Block number (height)
pub type BlockNumber = u64;

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Balance in the smallest native unit
/// u128 leaves headroom for `fee * weight` products without floating point
pub type Balance = u128;

/// Term number, `timestamp / term_seconds`
pub type TermId = u64;

/// Vote and block counters
pub type VoteCount = u64;

/// Length of an account id in bytes
pub const ACCOUNT_ID_LEN: usize = 20;

/// AccountId = 20-byte hash of the account's public key
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId([u8; ACCOUNT_ID_LEN]);

impl AccountId {
    pub fn from_bytes(bytes: [u8; ACCOUNT_ID_LEN]) -> Self {
        AccountId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ACCOUNT_ID_LEN] {
        &self.0
    }

    /// Build from a raw slice, as found inside RLP payloads
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ACCOUNT_ID_LEN {
            return None;
        }
        let mut out = [0u8; ACCOUNT_ID_LEN];
        out.copy_from_slice(bytes);
        Some(AccountId::from_bytes(out))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.as_bytes()))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0[..6]))
    }
}

impl From<[u8; ACCOUNT_ID_LEN]> for AccountId {
    fn from(bytes: [u8; ACCOUNT_ID_LEN]) -> Self {
        AccountId(bytes)
    }
}

/// Account id parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountIdError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid account id length: {0} bytes")]
    InvalidLength(usize),
}

impl FromStr for AccountId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_str = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(hex_str).map_err(|e| AccountIdError::InvalidHex(e.to_string()))?;
        AccountId::from_slice(&bytes).ok_or(AccountIdError::InvalidLength(bytes.len()))
    }
}

// Hex strings on the wire and in checkpoints, like every RPC payload
impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
