//! Distribution checkpoint: the record, its codec and its durable store.

mod record;
mod store;

pub use record::{CheckpointRecord, DecodeError};
pub use store::{load_or_init, CheckpointStore, FileCheckpointStore, PersistenceError};
