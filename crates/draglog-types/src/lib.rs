//! Foundation types for DragLog.
//!
//! DragLog records provenance events (data transformations and the sources
//! they came from) against a ledger. Every other DragLog crate depends on
//! `draglog-types`.
//!
//! # Key Types
//!
//! - [`EventRecord`]: One provenance entry (log, feedback, or reliability)
//! - [`RecordKind`]: Discriminates the three record shapes
//! - [`HistoryEntry`]: One committed version in a record's change history
//! - [`Operation`]: Tagged body of every ledger call, as persisted locally
//! - [`Selector`]: Field-equality query over records
//! - [`Score`]: Reliability score (`f32`, as stored by the remote ledger)

pub mod digest;
pub mod error;
pub mod history;
pub mod operation;
pub mod record;
pub mod selector;

pub use error::TypeError;
pub use history::HistoryEntry;
pub use operation::{Operation, ReliabilityUpdate};
pub use record::{EventRecord, RecordKind, Score, NOT_APPLICABLE};
pub use selector::Selector;
