//! Append-only operation log for DragLog.
//!
//! Every ledger call made in local mode is persisted as one JSON object per
//! line. Lines are never rewritten or removed; state and history are
//! recovered by replaying the file from the start.

pub mod error;
pub mod line;
pub mod log;
pub mod scan;

pub use error::{Result, StoreError};
pub use line::LogLine;
pub use log::{AppendLog, SyncMode};
pub use scan::{Scan, ScannedLine};
