use std::collections::BTreeMap;

use draglog_types::{EventRecord, HistoryEntry, RecordKind, ReliabilityUpdate, Score, Selector};

use crate::error::LedgerError;

/// Operation boundary shared by the local emulation and the remote ledger
/// client. Mirrors the remote HTTP API one method per endpoint.
pub trait ProvenanceLedger: Send {
    /// Reset the ledger. Locally this truncates the append log and snapshot
    /// trail and seeds `sources`; the remote ledger seeds its own sources.
    fn init_ledger(&mut self, sources: BTreeMap<String, Score>) -> Result<(), LedgerError>;

    fn create_log_record(&mut self, record: EventRecord) -> Result<(), LedgerError>;

    fn create_feedback_record(&mut self, record: EventRecord) -> Result<(), LedgerError>;

    /// Register a data source at the default score, carrying the digest of
    /// its content.
    fn create_reliability_record(
        &mut self,
        source_id: &str,
        digest: &str,
        reserved: &str,
    ) -> Result<(), LedgerError>;

    fn create_reliability_records_batch(&mut self, records: Vec<EventRecord>) -> Result<(), LedgerError>;

    fn update_reliability_record(&mut self, update: ReliabilityUpdate) -> Result<(), LedgerError>;

    /// Every live record of `kind`, in creation order.
    fn get_all_records(&self, kind: RecordKind) -> Result<Vec<EventRecord>, LedgerError>;

    fn get_record(&self, kind: RecordKind, id: &str) -> Result<EventRecord, LedgerError>;

    /// Live records of any kind matching `selector`.
    fn query_records(&self, selector: &Selector) -> Result<Vec<EventRecord>, LedgerError>;

    fn get_history_for_record(&self, id: &str) -> Result<Vec<HistoryEntry>, LedgerError>;

    fn delete_record(&mut self, _id: &str) -> Result<(), LedgerError> {
        Err(LedgerError::Unsupported("delete_record"))
    }

    /// Checkpoint the reliability table to the snapshot trail.
    fn dump_reliability_records(&mut self) -> Result<(), LedgerError> {
        Err(LedgerError::Unsupported("dump_reliability_records"))
    }
}
