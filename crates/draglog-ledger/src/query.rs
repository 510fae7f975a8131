use draglog_store::AppendLog;
use draglog_types::{EventRecord, HistoryEntry, RecordKind, Selector};

use crate::error::LedgerError;
use crate::replay::{self, RecordReplay};

/// Replay-based read views over an append log.
///
/// Every call scans the log from the start. An empty log yields empty
/// results, never an error.
#[derive(Clone, Copy, Debug)]
pub struct QueryFacade<'a> {
    log: &'a AppendLog,
}

impl<'a> QueryFacade<'a> {
    pub fn new(log: &'a AppendLog) -> Self {
        Self { log }
    }

    /// Replay the whole log.
    pub fn replay(&self) -> Result<RecordReplay, LedgerError> {
        let mut replay = RecordReplay::new();
        for line in self.log.scan()? {
            replay.apply(&line?)?;
        }
        Ok(replay)
    }

    /// Live records of `kind` at their current version, in creation order.
    pub fn all_records_of_kind(&self, kind: RecordKind) -> Result<Vec<EventRecord>, LedgerError> {
        Ok(self.replay()?.records_of_kind(kind))
    }

    /// Live records of every kind matching `selector`, in creation order.
    pub fn query_records(&self, selector: &Selector) -> Result<Vec<EventRecord>, LedgerError> {
        Ok(self.replay()?.records_where(|r| selector.matches(r)))
    }

    /// Most recent version of `id`; [`LedgerError::NotFound`] if it never
    /// existed or its last line deleted it.
    pub fn record_by_id(&self, id: &str) -> Result<EventRecord, LedgerError> {
        let lines = self.log.scan()?.map(|l| l.map_err(LedgerError::from));
        replay::current_version(id, lines)?.ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    /// Every version of `id`, oldest first.
    pub fn history_of(&self, id: &str) -> Result<Vec<HistoryEntry>, LedgerError> {
        let lines = self.log.scan()?.map(|l| l.map_err(LedgerError::from));
        replay::history_of(id, lines)
    }
}
