use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// File locations for local mode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Append log of every operation.
    pub log_path: PathBuf,
    /// Trail of `(feedback, full score table)` checkpoints.
    pub snapshot_path: PathBuf,
    /// `fsync` the append log after every line.
    pub sync_every_write: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("logs/draglog.jsonl"),
            snapshot_path: PathBuf::from("logs/reliability_history.log"),
            sync_every_write: false,
        }
    }
}

impl LedgerConfig {
    /// Both files placed under `dir` with their default names.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            log_path: dir.join("draglog.jsonl"),
            snapshot_path: dir.join("reliability_history.log"),
            sync_every_write: false,
        }
    }
}
