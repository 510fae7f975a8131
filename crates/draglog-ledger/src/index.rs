use std::collections::HashMap;

use draglog_store::{AppendLog, ScannedLine};
use draglog_types::{Operation, RecordKind};

use crate::error::LedgerError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct IndexEntry {
    offsets: Vec<u64>,
    kind: Option<RecordKind>,
    live: bool,
}

/// Incremental index from record ID to the byte offsets of every log line
/// touching it, in append order.
///
/// Built once by scanning the log and then kept current by feeding it each
/// appended line. Answers must match a full replay of the log.
#[derive(Clone, Debug, Default)]
pub struct RecordIndex {
    entries: HashMap<String, IndexEntry>,
}

impl RecordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every line currently in `log`.
    pub fn build(log: &AppendLog) -> Result<Self, LedgerError> {
        let mut index = Self::new();
        for line in log.scan()? {
            index.record(&line?);
        }
        Ok(index)
    }

    /// Account for one appended line.
    pub fn record(&mut self, line: &ScannedLine) {
        let operation = &line.line.operation;
        let created = operation.creates();
        for id in operation.touched_ids() {
            let entry = self.entries.entry(id.to_string()).or_default();
            entry.offsets.push(line.offset);
            if created.is_some() {
                entry.kind = created;
                entry.live = true;
            } else if matches!(operation, Operation::DeleteRecord { .. }) {
                entry.live = false;
            }
        }
    }

    /// Offsets of every line touching `id`, oldest first.
    pub fn offsets(&self, id: &str) -> &[u64] {
        self.entries
            .get(id)
            .map(|e| e.offsets.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `id` currently exists (created and not deleted since).
    pub fn is_live(&self, id: &str) -> bool {
        self.entries.get(id).is_some_and(|e| e.live)
    }

    /// Kind of the most recent creation of `id`.
    pub fn kind_of(&self, id: &str) -> Option<RecordKind> {
        self.entries.get(id).and_then(|e| e.kind)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of distinct IDs ever touched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
