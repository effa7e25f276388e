//! Bucket layout and wall-clock rotation shared by the file sinks
//!
//! Each symbol gets its own directory under the output root. A bucket writes
//! to a hidden `.inprogress` file and is finalized by renaming it to its
//! visible name, so readers only ever see complete files.

use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};

/// Time-based rotation policy
#[derive(Debug, Clone, Copy)]
pub struct RotationPolicy {
    interval: Duration,
}

impl RotationPolicy {
    pub fn new(rotation_interval_secs: u64) -> Self {
        Self {
            interval: Duration::seconds(rotation_interval_secs as i64),
        }
    }

    /// Whether a bucket opened at `opened_at` should be finalized at `now`
    pub fn is_due(&self, opened_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - opened_at >= self.interval
    }
}

/// Directory name for a symbol, restricted to `[A-Za-z0-9_-]`
///
/// Keeps every bucket a direct child of the output root.
fn bucket_name(symbol: &str) -> String {
    let name: String = symbol
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        "_".to_string()
    } else {
        name
    }
}

/// Paths of one bucket part file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartPaths {
    pub in_progress: PathBuf,
    pub finished: PathBuf,
}

impl PartPaths {
    /// Paths for the part of `symbol` opened at `opened_at`
    ///
    /// `seq` disambiguates parts opened within the same second.
    pub fn new(
        root: &Path,
        symbol: &str,
        opened_at: DateTime<Utc>,
        seq: u64,
        extension: &str,
    ) -> Self {
        let dir = root.join(bucket_name(symbol));
        let stem = format!("part-{}-{}", opened_at.format("%Y%m%d-%H%M%S"), seq);
        Self {
            in_progress: dir.join(format!(".{}.{}.inprogress", stem, extension)),
            finished: dir.join(format!("{}.{}", stem, extension)),
        }
    }
}
