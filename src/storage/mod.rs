// Storage - Persistence layer
pub mod checkpoint;
pub mod db;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use db::{Database, DatabaseError};
