//! Durable storage for the checkpoint record.
//!
//! The file holds exactly one record at all times. Writes go to a temporary
//! file in the same directory which is fsynced and then renamed over the
//! target, so a crash leaves either the old record or the new one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::record::{CheckpointRecord, DecodeError};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to write checkpoint {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("checkpoint read-back failed: {0}")]
    ReadBack(#[from] DecodeError),
    #[error("checkpoint read-back does not match the written record")]
    Mismatch,
    #[error("checkpoint writer task failed: {0}")]
    Task(String),
    #[error("cannot read checkpoint: {0}")]
    Unreadable(#[source] DecodeError),
}

/// Storage backend for the checkpoint.
///
/// Implementations are blocking; async callers should go through
/// `tokio::task::spawn_blocking`.
pub trait CheckpointStore: Send + Sync + 'static {
    /// Load the stored record. `Ok(None)` means nothing has been stored yet.
    fn load(&self) -> Result<Option<CheckpointRecord>, DecodeError>;

    /// Replace the stored record with `record`.
    fn persist(&self, record: &CheckpointRecord) -> Result<(), PersistenceError>;
}

/// Checkpoint stored in a single file.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, source: io::Error) -> PersistenceError {
        PersistenceError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> Result<Option<CheckpointRecord>, DecodeError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        CheckpointRecord::from_bytes(&bytes).map(Some)
    }

    fn persist(&self, record: &CheckpointRecord) -> Result<(), PersistenceError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.write_err(e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".landing-checkpoint")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| self.write_err(e))?;
        record
            .serialize(tmp.as_file_mut())
            .and_then(|()| tmp.as_file_mut().flush())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| self.write_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.write_err(e.error))?;

        // Make the rename itself durable. Best effort: not every platform
        // allows opening a directory.
        #[cfg(unix)]
        {
            if let Ok(dir) = fs::File::open(&dir) {
                let _ = dir.sync_all();
            }
        }

        tracing::trace!(path = %self.path.display(), last = record.last, "Checkpoint written");
        Ok(())
    }
}

/// Load the persisted checkpoint, or create and persist `initial` if none
/// can be used.
///
/// A persisted record always wins over `initial`, even when its parameters
/// differ: account changes need an operator to remove the old checkpoint.
/// A corrupt checkpoint is replaced, which may repeat a payout. An I/O
/// error while reading is returned instead, since the record behind it may
/// still be valid.
pub fn load_or_init(
    store: &dyn CheckpointStore,
    initial: CheckpointRecord,
) -> Result<CheckpointRecord, PersistenceError> {
    match store.load() {
        Ok(Some(record)) => {
            if record.source != initial.source
                || record.destination != initial.destination
                || record.amount != initial.amount
            {
                tracing::warn!(
                    persisted_source = %record.source,
                    persisted_destination = %record.destination,
                    persisted_amount = %record.amount,
                    configured_source = %initial.source,
                    configured_destination = %initial.destination,
                    configured_amount = %initial.amount,
                    "Persisted checkpoint differs from configuration; keeping persisted record. \
                     Remove the checkpoint file to apply the new configuration."
                );
            }
            tracing::info!(
                source = %record.source,
                destination = %record.destination,
                amount = %record.amount,
                last = record.last,
                "Loaded distribution checkpoint"
            );
            Ok(record)
        }
        Ok(None) => {
            tracing::info!(last = initial.last, "No distribution checkpoint found, creating one");
            store.persist(&initial)?;
            Ok(initial)
        }
        Err(DecodeError::Io(e)) => Err(PersistenceError::Unreadable(DecodeError::Io(e))),
        Err(e) => {
            tracing::warn!(
                error = %e,
                last = initial.last,
                "Distribution checkpoint corrupt; starting from configuration. \
                 Prior progress may be lost and the next due payout may repeat one already made."
            );
            store.persist(&initial)?;
            Ok(initial)
        }
    }
}
