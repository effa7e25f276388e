//! Driver state checkpoints
//!
//! Periodically persists per-symbol watermarks and open window buffers as
//! JSON so a restarted pipeline resumes with its windows intact. Files are
//! written to a temporary sibling and renamed into place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feed::Tick;

/// Current on-disk format version
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported checkpoint version: {0}")]
    UnsupportedVersion(u32),
}

/// Open buffer of one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub start: i64,
    pub ticks: Vec<Tick>,
}

/// State of one symbol partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSnapshot {
    pub symbol: String,
    pub max_seen: Option<i64>,
    pub windows: Vec<WindowSnapshot>,
}

/// Full driver state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverSnapshot {
    pub partitions: Vec<PartitionSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    version: u32,
    taken_at: DateTime<Utc>,
    state: DriverSnapshot,
}

/// Reads and writes checkpoints at a fixed path
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replace the checkpoint with `state`
    pub fn save(&self, state: &DriverSnapshot) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = CheckpointFile {
            version: CHECKPOINT_VERSION,
            taken_at: Utc::now(),
            state: state.clone(),
        };
        let bytes = serde_json::to_vec(&file)?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = ?self.path, partitions = state.partitions.len(), "Checkpoint written");
        Ok(())
    }

    /// Load the last checkpoint, or `None` if none was written yet
    pub fn load(&self) -> Result<Option<DriverSnapshot>, CheckpointError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let file: CheckpointFile = serde_json::from_slice(&bytes)?;
        if file.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion(file.version));
        }

        tracing::info!(
            path = ?self.path,
            taken_at = %file.taken_at,
            partitions = file.state.partitions.len(),
            "Loaded checkpoint"
        );
        Ok(Some(file.state))
    }
}
