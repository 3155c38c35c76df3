// Database - RocksDB wrapper
use rocksdb::{Options, DB};
use std::path::Path;
use std::sync::Arc;

/// Thin wrapper around RocksDB
pub struct Database {
    db: Arc<DB>,
}

impl Database {
    /// Open or create a database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        // Audit data is small; keep file churn low
        opts.set_keep_log_file_num(5);
        opts.set_max_manifest_file_size(16 * 1024 * 1024);
        opts.set_max_background_jobs(2);

        let db = DB::open(&opts, path).map_err(|e| DatabaseError::OpenFailed(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, DatabaseError> {
        self.db
            .get(key)
            .map_err(|e| DatabaseError::ReadFailed(e.to_string()))
    }

    /// Atomic batch write
    pub fn batch_write(&self, ops: Vec<WriteOp>) -> Result<(), DatabaseError> {
        let mut batch = rocksdb::WriteBatch::default();

        for op in ops {
            match op {
                WriteOp::Put { key, value } => batch.put(&key, &value),
            }
        }

        self.db
            .write(batch)
            .map_err(|e| DatabaseError::WriteFailed(e.to_string()))
    }

    /// Entries under `prefix` in key order, stopping at the first read error
    pub fn prefix_entries(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, DatabaseError> {
        let mut entries = Vec::new();
        for item in self.db.prefix_iterator(prefix) {
            let (key, value) = item.map_err(|e| DatabaseError::ReadFailed(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }
}

/// Write operation for batches
#[derive(Debug, Clone)]
pub enum WriteOp {
    Put { key: Vec<u8>, value: Vec<u8> },
}

/// Database errors
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
}
