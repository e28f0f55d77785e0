//! Artifact snapshots: debug/audit JSON dumps of run state.
//!
//! Files are named `<label>_<YYYYMMDD_HHMMSS>.json`. There is no schema
//! versioning and nothing reads them back.
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::TrendpostError;

pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `value` as pretty JSON. Values that cannot be serialized are
    /// stored as their debug string. Returns the file written.
    pub fn snapshot<T>(&self, label: &str, value: &T) -> Result<PathBuf, TrendpostError>
    where
        T: Serialize + Debug + ?Sized,
    {
        self.snapshot_at(label, value, Local::now())
    }

    pub fn snapshot_at<T>(
        &self,
        label: &str,
        value: &T,
        at: DateTime<Local>,
    ) -> Result<PathBuf, TrendpostError>
    where
        T: Serialize + Debug + ?Sized,
    {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| TrendpostError::Snapshot(format!("{}: {}", self.dir.display(), e)))?;

        let body = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
            warn!(label, error = %e, "snapshot value not serializable, storing debug form");
            serde_json::Value::String(format!("{:?}", value)).to_string()
        });

        let path = self.free_path(&snapshot_file_name(label, at));
        std::fs::write(&path, body)
            .map_err(|e| TrendpostError::Snapshot(format!("{}: {}", path.display(), e)))?;

        info!(path = %path.display(), "artifact snapshot saved");
        Ok(path)
    }

    /// Two snapshots of one label in the same second get `_1`, `_2`, ...
    fn free_path(&self, file_name: &str) -> PathBuf {
        let candidate = self.dir.join(file_name);
        if !candidate.exists() {
            return candidate;
        }

        let stem = file_name.trim_end_matches(".json");
        (1..)
            .map(|n| self.dir.join(format!("{}_{}.json", stem, n)))
            .find(|path| !path.exists())
            .unwrap_or(candidate)
    }
}

/// `<label>_<YYYYMMDD_HHMMSS>.json`, with path separators in the label replaced.
pub fn snapshot_file_name(label: &str, at: DateTime<Local>) -> String {
    let label: String = label
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}_{}.json", label, at.format("%Y%m%d_%H%M%S"))
}
