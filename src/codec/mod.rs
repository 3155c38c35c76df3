// Codec - RLP payloads the auditor has to look inside
// Principle: everything else about the wire format belongs to the node

pub mod action;
pub mod bitset;

pub use action::{decode_stake_action, ActionDecodeError, StakeAction};
pub use bitset::{decode_committed, decode_missing, encode_bitset, BitsetError};
