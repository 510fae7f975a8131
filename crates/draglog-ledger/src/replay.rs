use std::collections::{BTreeMap, HashMap};

use draglog_store::ScannedLine;
use draglog_types::{EventRecord, HistoryEntry, Operation, RecordKind, Score};

use crate::emulator::ensure_finite;
use crate::error::LedgerError;

#[derive(Clone, Debug)]
struct LiveRecord {
    record: EventRecord,
    /// Position of the creation that produced this record among all
    /// creations replayed so far.
    created: u64,
}

/// Folds log lines into the current version of every record.
///
/// `init_sources` always heads a log (the reset path truncates the log
/// before writing it), so replaying it only inserts sources.
#[derive(Clone, Debug, Default)]
pub struct RecordReplay {
    live: HashMap<String, LiveRecord>,
    creations: u64,
    applied: u64,
}

impl RecordReplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one line. Returns the IDs it touched.
    pub fn apply(&mut self, line: &ScannedLine) -> Result<Vec<String>, LedgerError> {
        let operation = &line.line.operation;
        match operation {
            Operation::InitSources { sources } => {
                for (id, score) in sources {
                    self.create(EventRecord::reliability(id.clone(), *score));
                }
            }
            Operation::CreateLogRecord(record)
            | Operation::CreateFeedbackRecord(record)
            | Operation::CreateReliabilityRecord(record) => self.create(record.clone()),
            Operation::CreateReliabilityRecordsBatch { records } => {
                for record in records {
                    self.create(record.clone());
                }
            }
            Operation::UpdateReliabilityRecord(update) => {
                let live = self
                    .live
                    .get_mut(&update.source_id)
                    .filter(|l| l.record.kind == RecordKind::Reliability)
                    .ok_or_else(|| LedgerError::UnknownSource(update.source_id.clone()))?;
                let next = update.apply(live.record.reliability_score);
                ensure_finite(&update.source_id, next)?;
                live.record.reliability_score = next;
            }
            Operation::DeleteRecord { record_id } => {
                self.live.remove(record_id);
            }
        }

        self.applied += 1;
        Ok(operation.touched_ids().into_iter().map(str::to_string).collect())
    }

    fn create(&mut self, record: EventRecord) {
        self.creations += 1;
        self.live.insert(
            record.record_id.clone(),
            LiveRecord {
                record,
                created: self.creations,
            },
        );
    }

    /// Current version of `id`, or `None` if it never existed or was deleted.
    pub fn current(&self, id: &str) -> Option<&EventRecord> {
        self.live.get(id).map(|l| &l.record)
    }

    /// Live records of `kind`, in the order they were created.
    pub fn records_of_kind(&self, kind: RecordKind) -> Vec<EventRecord> {
        self.records_where(|r| r.kind == kind)
    }

    /// Live records of any kind accepted by `keep`, in the order they were
    /// created.
    pub fn records_where(&self, keep: impl Fn(&EventRecord) -> bool) -> Vec<EventRecord> {
        let mut live: Vec<&LiveRecord> = self.live.values().filter(|l| keep(&l.record)).collect();
        live.sort_by_key(|l| l.created);
        live.into_iter().map(|l| l.record.clone()).collect()
    }

    /// Score of every live reliability record.
    pub fn scores(&self) -> BTreeMap<String, Score> {
        self.live
            .iter()
            .filter(|(_, l)| l.record.kind == RecordKind::Reliability)
            .map(|(id, l)| (id.clone(), l.record.reliability_score))
            .collect()
    }

    /// Number of lines applied.
    pub fn applied(&self) -> u64 {
        self.applied
    }
}

/// Replay `lines` and build the history of `id`, one entry per line that
/// touches it, oldest first. Lines not touching `id` are ignored.
pub fn history_of<I>(id: &str, lines: I) -> Result<Vec<HistoryEntry>, LedgerError>
where
    I: IntoIterator<Item = Result<ScannedLine, LedgerError>>,
{
    let mut replay = RecordReplay::new();
    let mut history = Vec::new();
    for line in lines {
        let line = line?;
        if !line.line.operation.touches(id) {
            continue;
        }
        replay.apply(&line)?;

        let timestamp = line.line.ledger_timestamp();
        let entry = match replay.current(id) {
            Some(record) => HistoryEntry::version(record.clone(), timestamp, line.transaction_id),
            None => HistoryEntry::deletion(timestamp, line.transaction_id),
        };
        history.push(entry);
    }
    Ok(history)
}

/// Replay `lines` and return the current version of `id`.
pub fn current_version<I>(id: &str, lines: I) -> Result<Option<EventRecord>, LedgerError>
where
    I: IntoIterator<Item = Result<ScannedLine, LedgerError>>,
{
    let mut replay = RecordReplay::new();
    for line in lines {
        let line = line?;
        if line.line.operation.touches(id) {
            replay.apply(&line)?;
        }
    }
    Ok(replay.current(id).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use draglog_store::LogLine;
    use draglog_types::ReliabilityUpdate;

    fn line(offset: u64, operation: Operation) -> ScannedLine {
        ScannedLine {
            offset,
            line: LogLine::now(operation),
            transaction_id: format!("tx{offset}"),
        }
    }

    fn log(id: &str) -> Operation {
        Operation::CreateLogRecord(EventRecord::event(RecordKind::Log, id, "l"))
    }

    #[test]
    fn updates_follow_delta_rules() {
        let mut replay = RecordReplay::new();
        replay
            .apply(&line(0, Operation::InitSources {
                sources: BTreeMap::from([("s".to_string(), 0.5)]),
            }))
            .unwrap();
        replay
            .apply(&line(1, Operation::UpdateReliabilityRecord(ReliabilityUpdate::delta("s", 0.2))))
            .unwrap();
        assert_eq!(replay.scores()["s"], 0.7);

        replay
            .apply(&line(2, Operation::UpdateReliabilityRecord(ReliabilityUpdate::absolute("s", 9.0))))
            .unwrap();
        assert_eq!(replay.current("s").unwrap().reliability_score, 9.0);
        assert_eq!(replay.applied(), 3);
    }

    #[test]
    fn update_of_non_reliability_record_is_unknown_source() {
        let mut replay = RecordReplay::new();
        replay.apply(&line(0, log("l1"))).unwrap();
        let err = replay
            .apply(&line(1, Operation::UpdateReliabilityRecord(ReliabilityUpdate::delta("l1", 1.0))))
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownSource(id) if id == "l1"));
    }

    #[test]
    fn overflowing_update_fails_replay() {
        let mut replay = RecordReplay::new();
        replay
            .apply(&line(0, Operation::CreateReliabilityRecord(EventRecord::reliability("s", f32::MAX))))
            .unwrap();
        let err = replay
            .apply(&line(1, Operation::UpdateReliabilityRecord(ReliabilityUpdate::delta("s", f32::MAX))))
            .unwrap_err();
        assert!(matches!(err, LedgerError::NonFiniteScore { .. }));
        assert_eq!(replay.current("s").unwrap().reliability_score, f32::MAX);
    }

    #[test]
    fn records_of_kind_keep_creation_order() {
        let mut replay = RecordReplay::new();
        for (i, id) in ["c", "a", "b"].into_iter().enumerate() {
            replay.apply(&line(i as u64, log(id))).unwrap();
        }
        replay
            .apply(&line(3, Operation::CreateReliabilityRecord(EventRecord::reliability("s", 1.0))))
            .unwrap();
        replay
            .apply(&line(4, Operation::DeleteRecord { record_id: "a".into() }))
            .unwrap();

        let ids: Vec<String> = replay
            .records_of_kind(RecordKind::Log)
            .into_iter()
            .map(|r| r.record_id)
            .collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(replay.records_of_kind(RecordKind::Feedback), vec![]);
    }

    #[test]
    fn history_records_each_touching_line() {
        let lines = vec![
            line(0, log("x")),
            line(1, log("y")),
            line(2, Operation::DeleteRecord { record_id: "x".into() }),
            line(3, log("x")),
        ];
        let history = history_of("x", lines.into_iter().map(Ok)).unwrap();
        assert_eq!(history.len(), 3);
        assert!(!history[0].is_delete());
        assert!(history[1].is_delete());
        assert!(history[1].record().is_none());
        assert!(!history[2].is_delete());
        assert_eq!(history[2].transaction_id(), "tx3");
    }

    #[test]
    fn current_version_after_delete_is_none() {
        let lines = vec![
            line(0, log("x")),
            line(1, Operation::DeleteRecord { record_id: "x".into() }),
        ];
        assert_eq!(current_version("x", lines.into_iter().map(Ok)).unwrap(), None);
    }
}
