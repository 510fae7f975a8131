//! Client for the DragLog provenance ledger.
//!
//! A [`DragLogClient`] runs in one of two modes chosen by [`ClientConfig`]:
//! local mode satisfies every operation from the append log on disk, remote
//! mode forwards it to the ledger's HTTP API.

pub mod client;
pub mod config;
pub mod error;
pub mod remote;

pub use client::DragLogClient;
pub use config::{ClientConfig, Mode};
pub use error::{ClientError, ClientResult};
pub use remote::RemoteLedger;

pub use draglog_ledger::{LedgerConfig, LedgerError, LocalLedger, ProvenanceLedger};
pub use draglog_types::{EventRecord, HistoryEntry, RecordKind, ReliabilityUpdate, Score};
