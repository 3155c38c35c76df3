// Checkpoint - Resume point of the auditor
// Principle: the checkpoint and the findings of a height land in one batch

use super::db::{Database, DatabaseError, WriteOp};
use crate::audit::{AuditorState, Discrepancy};
use crate::types::BlockNumber;
use serde::{Deserialize, Serialize};
use std::path::Path;

const KEY_CHECKPOINT: &[u8] = b"meta:checkpoint";
const PREFIX_DISCREPANCY: &[u8] = b"discrepancy:";

/// Last committed height and the state carried past it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_audited: BlockNumber,
    pub state: AuditorState,
}

/// Checkpoints and discrepancy history in RocksDB
pub struct CheckpointStore {
    db: Database,
}

impl CheckpointStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    pub fn load(&self) -> Result<Option<Checkpoint>, DatabaseError> {
        match self.db.get(KEY_CHECKPOINT)? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(|e| DatabaseError::SerializationFailed(e.to_string())),
            None => Ok(None),
        }
    }

    /// Persist the checkpoint together with the height's discrepancies
    pub fn save(&self, checkpoint: &Checkpoint, discrepancies: &[Discrepancy]) -> Result<(), DatabaseError> {
        let mut ops = Vec::with_capacity(discrepancies.len() + 1);
        ops.push(WriteOp::Put {
            key: KEY_CHECKPOINT.to_vec(),
            value: encode(checkpoint)?,
        });
        for (index, discrepancy) in discrepancies.iter().enumerate() {
            ops.push(WriteOp::Put {
                key: discrepancy_key(discrepancy.height, index as u32),
                value: encode(discrepancy)?,
            });
        }
        self.db.batch_write(ops)
    }

    /// Every recorded discrepancy, by height
    pub fn discrepancies(&self) -> Result<Vec<Discrepancy>, DatabaseError> {
        self.db
            .prefix_entries(PREFIX_DISCREPANCY)?
            .into_iter()
            .map(|(_, value)| {
                bincode::deserialize(&value)
                    .map_err(|e| DatabaseError::SerializationFailed(e.to_string()))
            })
            .collect()
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, DatabaseError> {
    bincode::serialize(value).map_err(|e| DatabaseError::SerializationFailed(e.to_string()))
}

/// Big-endian height so keys sort by height
fn discrepancy_key(height: BlockNumber, index: u32) -> Vec<u8> {
    let mut key = PREFIX_DISCREPANCY.to_vec();
    key.extend_from_slice(&height.to_be_bytes());
    key.extend_from_slice(&index.to_be_bytes());
    key
}
