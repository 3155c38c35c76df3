// Types - Chain data as the auditor observes it

pub mod block;
pub mod primitives;
pub mod stake;

pub use block::{Action, Block, Transaction, TransactionKind};
pub use primitives::*;
pub use stake::{AccountState, Weight};
