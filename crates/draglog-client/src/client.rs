use std::collections::BTreeMap;

use tracing::info;

use draglog_ledger::{LedgerConfig, LocalLedger, ProvenanceLedger};
use draglog_types::digest::sha256_hex;
use draglog_types::{EventRecord, HistoryEntry, RecordKind, ReliabilityUpdate, Score, Selector};

use crate::config::{ClientConfig, Mode};
use crate::error::ClientResult;
use crate::remote::RemoteLedger;

/// Entry point for applications recording provenance.
pub struct DragLogClient {
    mode: Mode,
    ledger: Box<dyn ProvenanceLedger>,
}

impl DragLogClient {
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        match config.mode {
            Mode::Local => Self::local(&config.ledger),
            Mode::Remote => Ok(Self::remote(config.base_url.clone())),
        }
    }

    /// Serve everything from the append log described by `config`.
    pub fn local(config: &LedgerConfig) -> ClientResult<Self> {
        let ledger = LocalLedger::open(config)?;
        info!(log = %config.log_path.display(), "draglog client in local mode");
        Ok(Self {
            mode: Mode::Local,
            ledger: Box::new(ledger),
        })
    }

    /// Forward everything to the ledger API at `base_url`.
    pub fn remote(base_url: impl Into<String>) -> Self {
        let ledger = RemoteLedger::new(base_url);
        info!(url = ledger.base_url(), "draglog client in remote mode");
        Self {
            mode: Mode::Remote,
            ledger: Box::new(ledger),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn init_ledger(&mut self, sources: BTreeMap<String, Score>) -> ClientResult<()> {
        Ok(self.ledger.init_ledger(sources)?)
    }

    pub fn create_log_record(&mut self, record: EventRecord) -> ClientResult<()> {
        Ok(self.ledger.create_log_record(record)?)
    }

    pub fn create_feedback_record(&mut self, record: EventRecord) -> ClientResult<()> {
        Ok(self.ledger.create_feedback_record(record)?)
    }

    pub fn create_reliability_record(&mut self, source_id: &str, digest: &str, reserved: &str) -> ClientResult<()> {
        Ok(self.ledger.create_reliability_record(source_id, digest, reserved)?)
    }

    /// Register a data source, deriving its digest from `content`.
    /// Returns the digest.
    pub fn register_source(&mut self, source_id: &str, content: &[u8], reserved: &str) -> ClientResult<String> {
        let digest = sha256_hex(content);
        self.create_reliability_record(source_id, &digest, reserved)?;
        Ok(digest)
    }

    pub fn create_reliability_records_batch(&mut self, records: Vec<EventRecord>) -> ClientResult<()> {
        Ok(self.ledger.create_reliability_records_batch(records)?)
    }

    pub fn update_reliability_record(&mut self, update: ReliabilityUpdate) -> ClientResult<()> {
        Ok(self.ledger.update_reliability_record(update)?)
    }

    pub fn get_all_records(&self, kind: RecordKind) -> ClientResult<Vec<EventRecord>> {
        Ok(self.ledger.get_all_records(kind)?)
    }

    pub fn get_record(&self, kind: RecordKind, id: &str) -> ClientResult<EventRecord> {
        Ok(self.ledger.get_record(kind, id)?)
    }

    pub fn query_records(&self, selector: &Selector) -> ClientResult<Vec<EventRecord>> {
        Ok(self.ledger.query_records(selector)?)
    }

    pub fn get_history_for_record(&self, id: &str) -> ClientResult<Vec<HistoryEntry>> {
        Ok(self.ledger.get_history_for_record(id)?)
    }

    pub fn delete_record(&mut self, id: &str) -> ClientResult<()> {
        Ok(self.ledger.delete_record(id)?)
    }

    pub fn dump_reliability_records(&mut self) -> ClientResult<()> {
        Ok(self.ledger.dump_reliability_records()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draglog_ledger::LedgerError;

    use crate::error::ClientError;

    fn local(dir: &tempfile::TempDir) -> DragLogClient {
        DragLogClient::local(&LedgerConfig::in_dir(dir.path())).unwrap()
    }

    #[test]
    fn from_config_picks_mode() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            ledger: LedgerConfig::in_dir(dir.path()),
            ..ClientConfig::default()
        };
        assert_eq!(DragLogClient::from_config(&config).unwrap().mode(), Mode::Local);

        let config = ClientConfig {
            mode: Mode::Remote,
            ..config
        };
        let client = DragLogClient::from_config(&config).unwrap();
        assert_eq!(client.mode(), Mode::Remote);
        assert!(!dir.path().join("draglog.jsonl").exists());
    }

    #[test]
    fn register_source_stores_content_digest() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = local(&dir);
        let digest = client.register_source("default0", b"abc", "").unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        let record = client.get_record(RecordKind::Reliability, "default0").unwrap();
        assert_eq!(record.input, digest);
    }

    #[test]
    fn local_round_trip_through_client() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = local(&dir);
        client
            .init_ledger(BTreeMap::from([("default0".to_string(), 1.0)]))
            .unwrap();
        client
            .create_log_record(EventRecord::event(RecordKind::Log, "default0-reranker0", "reranker0"))
            .unwrap();
        client
            .update_reliability_record(ReliabilityUpdate::delta("default0", -0.25))
            .unwrap();

        assert_eq!(client.get_all_records(RecordKind::Log).unwrap().len(), 1);
        assert_eq!(
            client
                .get_record(RecordKind::Reliability, "default0")
                .unwrap()
                .reliability_score,
            0.75
        );
        assert_eq!(client.get_history_for_record("default0").unwrap().len(), 2);
        let by_logger = Selector::new().field("loggerID", "reranker0");
        assert_eq!(client.query_records(&by_logger).unwrap().len(), 1);
        client.dump_reliability_records().unwrap();
    }

    #[test]
    fn local_errors_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = local(&dir);
        let err = client
            .update_reliability_record(ReliabilityUpdate::absolute("ghost", 1.0))
            .unwrap_err();
        assert!(matches!(err, ClientError::Ledger(LedgerError::UnknownSource(_))));

        let err = client
            .update_reliability_record(ReliabilityUpdate::delta("ghost", f32::NAN))
            .unwrap_err();
        assert!(matches!(err, ClientError::Ledger(LedgerError::UnknownSource(_))));
    }
}
