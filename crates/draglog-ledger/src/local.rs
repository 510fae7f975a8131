use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use draglog_store::{AppendLog, ScannedLine, SyncMode};
use draglog_types::{EventRecord, HistoryEntry, Operation, RecordKind, ReliabilityUpdate, Score, Selector};

use crate::config::LedgerConfig;
use crate::emulator::{ensure_finite, ReliabilityLedger};
use crate::error::LedgerError;
use crate::index::RecordIndex;
use crate::query::QueryFacade;
use crate::replay::{self, RecordReplay};
use crate::snapshot::SnapshotTrail;
use crate::traits::ProvenanceLedger;

/// Score given to a data source registered through
/// [`ProvenanceLedger::create_reliability_record`].
pub const DEFAULT_RELIABILITY_SCORE: Score = 100.0;

/// File-backed ledger satisfying every operation without the network.
///
/// Every mutation is appended to the log first and only then applied to the
/// in-memory reliability table and record index, so a failed append leaves
/// the state untouched. The one exception is `init_ledger`, which removes
/// both files first; if its append fails the ledger is left empty. Scores
/// that are not finite are refused before anything is written. Opening over
/// an existing log replays it.
#[derive(Debug)]
pub struct LocalLedger {
    log: AppendLog,
    reliability: ReliabilityLedger,
    index: RecordIndex,
    last_feedback: Option<String>,
}

impl LocalLedger {
    pub fn open(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let sync_mode = if config.sync_every_write {
            SyncMode::EveryWrite
        } else {
            SyncMode::OsDefault
        };
        let log = AppendLog::open_with(&config.log_path, sync_mode)?;
        let trail = SnapshotTrail::open(&config.snapshot_path)?;

        let mut replay = RecordReplay::new();
        let mut index = RecordIndex::new();
        let mut last_feedback = None;
        for line in log.scan()? {
            let line = line?;
            replay.apply(&line)?;
            index.record(&line);
            if let Operation::CreateFeedbackRecord(record) = &line.line.operation {
                last_feedback = Some(record.record_id.clone());
            }
        }

        let mut reliability = ReliabilityLedger::new(trail);
        reliability.restore(replay.scores());
        info!(
            lines = replay.applied(),
            records = index.len(),
            sources = reliability.scores().len(),
            "local ledger opened"
        );

        Ok(Self {
            log,
            reliability,
            index,
            last_feedback,
        })
    }

    /// Current score of `source_id`.
    pub fn get_reliability_score(&self, source_id: &str) -> Result<Score, LedgerError> {
        self.reliability.get(source_id)
    }

    pub fn all_records_of_kind(&self, kind: RecordKind) -> Result<Vec<EventRecord>, LedgerError> {
        self.query().all_records_of_kind(kind)
    }

    /// Most recent version of `id`, reading only the lines indexed for it.
    pub fn record_by_id(&self, id: &str) -> Result<EventRecord, LedgerError> {
        if !self.index.is_live(id) {
            return Err(LedgerError::NotFound(id.to_string()));
        }
        replay::current_version(id, self.indexed_lines(id))?
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    /// Every version of `id`, reading only the lines indexed for it.
    pub fn history_of(&self, id: &str) -> Result<Vec<HistoryEntry>, LedgerError> {
        replay::history_of(id, self.indexed_lines(id))
    }

    /// Full-scan views over the same log.
    pub fn query(&self) -> QueryFacade<'_> {
        QueryFacade::new(&self.log)
    }

    pub fn reliability(&self) -> &ReliabilityLedger {
        &self.reliability
    }

    pub fn log(&self) -> &AppendLog {
        &self.log
    }

    /// Record ID of the most recent feedback record, if any.
    pub fn last_feedback(&self) -> Option<&str> {
        self.last_feedback.as_deref()
    }

    fn indexed_lines(&self, id: &str) -> impl Iterator<Item = Result<ScannedLine, LedgerError>> + '_ {
        self.index
            .offsets(id)
            .iter()
            .map(|offset| self.log.read_at(*offset).map_err(LedgerError::from))
    }

    fn ensure_absent(&self, id: &str) -> Result<(), LedgerError> {
        if self.index.is_live(id) {
            return Err(LedgerError::AlreadyExists(id.to_string()));
        }
        Ok(())
    }

    fn append(&mut self, operation: Operation) -> Result<ScannedLine, LedgerError> {
        let line = self.log.append(operation)?;
        self.index.record(&line);
        Ok(line)
    }
}

impl ProvenanceLedger for LocalLedger {
    fn init_ledger(&mut self, sources: BTreeMap<String, Score>) -> Result<(), LedgerError> {
        for (id, score) in &sources {
            ensure_finite(id, *score)?;
        }

        self.log.truncate()?;
        self.reliability.trail().truncate()?;
        self.index.clear();
        self.last_feedback = None;

        let appended = self.append(Operation::InitSources {
            sources: sources.clone(),
        });
        if let Err(e) = appended {
            // The files are already gone; keep memory in step with them.
            self.reliability.restore(BTreeMap::new());
            return Err(e);
        }
        self.reliability.reset(sources)
    }

    fn create_log_record(&mut self, record: EventRecord) -> Result<(), LedgerError> {
        let record = record.into_kind(RecordKind::Log);
        self.ensure_absent(&record.record_id)?;
        self.append(Operation::CreateLogRecord(record))?;
        Ok(())
    }

    fn create_feedback_record(&mut self, record: EventRecord) -> Result<(), LedgerError> {
        let record = record.into_kind(RecordKind::Feedback);
        self.ensure_absent(&record.record_id)?;
        let id = record.record_id.clone();
        self.append(Operation::CreateFeedbackRecord(record))?;
        self.last_feedback = Some(id);
        Ok(())
    }

    fn create_reliability_record(
        &mut self,
        source_id: &str,
        digest: &str,
        reserved: &str,
    ) -> Result<(), LedgerError> {
        self.ensure_absent(source_id)?;
        let mut record = EventRecord::reliability(source_id, DEFAULT_RELIABILITY_SCORE);
        record.input = digest.to_string();
        record.reserved = reserved.to_string();

        self.append(Operation::CreateReliabilityRecord(record))?;
        self.reliability.insert(source_id, DEFAULT_RELIABILITY_SCORE);
        Ok(())
    }

    fn create_reliability_records_batch(&mut self, records: Vec<EventRecord>) -> Result<(), LedgerError> {
        let records: Vec<EventRecord> = records
            .into_iter()
            .map(|r| r.into_kind(RecordKind::Reliability))
            .collect();
        if records.is_empty() {
            return Ok(());
        }

        let mut seen = HashSet::new();
        for record in &records {
            ensure_finite(&record.record_id, record.reliability_score)?;
            self.ensure_absent(&record.record_id)?;
            if !seen.insert(record.record_id.as_str()) {
                return Err(LedgerError::AlreadyExists(record.record_id.clone()));
            }
        }

        let scores: Vec<(String, Score)> = records
            .iter()
            .map(|r| (r.record_id.clone(), r.reliability_score))
            .collect();
        self.append(Operation::CreateReliabilityRecordsBatch { records })?;
        for (id, score) in scores {
            self.reliability.insert(id, score);
        }
        Ok(())
    }

    fn update_reliability_record(&mut self, update: ReliabilityUpdate) -> Result<(), LedgerError> {
        let current = self.reliability.get(&update.source_id)?;
        ensure_finite(&update.source_id, update.apply(current))?;
        let line = self.append(Operation::UpdateReliabilityRecord(update.clone()))?;
        let score = self.reliability.apply(&update)?;
        debug!(source = %update.source_id, score, offset = line.offset, "reliability record updated");
        Ok(())
    }

    fn get_all_records(&self, kind: RecordKind) -> Result<Vec<EventRecord>, LedgerError> {
        self.all_records_of_kind(kind)
    }

    fn get_record(&self, kind: RecordKind, id: &str) -> Result<EventRecord, LedgerError> {
        if self.index.kind_of(id) != Some(kind) {
            return Err(LedgerError::NotFound(id.to_string()));
        }
        self.record_by_id(id)
    }

    fn query_records(&self, selector: &Selector) -> Result<Vec<EventRecord>, LedgerError> {
        self.query().query_records(selector)
    }

    fn get_history_for_record(&self, id: &str) -> Result<Vec<HistoryEntry>, LedgerError> {
        self.history_of(id)
    }

    fn delete_record(&mut self, id: &str) -> Result<(), LedgerError> {
        if !self.index.is_live(id) {
            return Err(LedgerError::NotFound(id.to_string()));
        }
        if self.index.kind_of(id) == Some(RecordKind::Reliability) {
            return Err(LedgerError::InvalidOperation(format!(
                "reliability source {id} can only be removed by init_ledger"
            )));
        }
        self.append(Operation::DeleteRecord {
            record_id: id.to_string(),
        })?;
        debug!(record = id, "record deleted");
        Ok(())
    }

    fn dump_reliability_records(&mut self) -> Result<(), LedgerError> {
        let note = self.last_feedback.clone().unwrap_or_default();
        self.reliability.snapshot(&note)
    }
}
