//! Local emulation of the DragLog ledger.
//!
//! This crate lets a client run disconnected from the remote ledger service
//! while preserving its semantics. It provides:
//! - `ProvenanceLedger`, the operation boundary shared with the remote client
//! - `ReliabilityLedger`, the in-memory source → score table with an
//!   append-only snapshot trail
//! - `QueryFacade`, replay-based "all records", "record by ID" and history views
//! - `RecordIndex`, an incremental ID → line-offset index
//! - `LocalLedger`, which ties the append log, emulator and index together

pub mod config;
pub mod emulator;
pub mod error;
pub mod index;
pub mod local;
pub mod query;
pub mod replay;
pub mod snapshot;
pub mod traits;

pub use config::LedgerConfig;
pub use emulator::{ensure_finite, ReliabilityLedger};
pub use error::LedgerError;
pub use index::RecordIndex;
pub use local::{LocalLedger, DEFAULT_RELIABILITY_SCORE};
pub use query::QueryFacade;
pub use replay::RecordReplay;
pub use snapshot::{SnapshotEntry, SnapshotTrail};
pub use traits::ProvenanceLedger;
