use std::collections::BTreeMap;

use tracing::{debug, info};

use draglog_types::{ReliabilityUpdate, Score};

use crate::error::LedgerError;
use crate::snapshot::SnapshotTrail;

/// Reject scores that cannot be written to the log or snapshot trail.
/// JSON has no encoding for NaN or infinities.
pub fn ensure_finite(source_id: &str, score: Score) -> Result<(), LedgerError> {
    if score.is_finite() {
        Ok(())
    } else {
        Err(LedgerError::NonFiniteScore {
            source_id: source_id.to_string(),
            score,
        })
    }
}

/// In-memory reliability table: source ID → current score.
///
/// Sources must be initialized (by [`reset`](Self::reset) or
/// [`insert`](Self::insert)) before they can be read or updated; anything else
/// is [`LedgerError::UnknownSource`]. Scores are unbounded.
///
/// Updates never snapshot implicitly. Checkpoints are written only by
/// [`reset`](Self::reset) and explicit [`snapshot`](Self::snapshot) calls.
#[derive(Debug)]
pub struct ReliabilityLedger {
    scores: BTreeMap<String, Score>,
    trail: SnapshotTrail,
}

impl ReliabilityLedger {
    /// An empty table writing checkpoints to `trail`.
    pub fn new(trail: SnapshotTrail) -> Self {
        Self {
            scores: BTreeMap::new(),
            trail,
        }
    }

    /// Replace the whole table with `sources` and write an initial
    /// checkpoint with an empty feedback note.
    pub fn reset(&mut self, sources: BTreeMap<String, Score>) -> Result<(), LedgerError> {
        for (id, score) in &sources {
            ensure_finite(id, *score)?;
        }
        self.scores = sources;
        info!(sources = self.scores.len(), "reliability table reset");
        self.snapshot("")
    }

    /// Replace the table from a replay, without writing a checkpoint.
    pub(crate) fn restore(&mut self, scores: BTreeMap<String, Score>) {
        debug!(sources = scores.len(), "reliability table restored from log");
        self.scores = scores;
    }

    /// Start tracking a newly created source.
    pub fn insert(&mut self, source_id: impl Into<String>, score: Score) {
        self.scores.insert(source_id.into(), score);
    }

    /// `new = old + amount` when `is_delta`, otherwise `new = amount`.
    ///
    /// A result that is not finite (including f32 overflow) is rejected and
    /// the score is left unchanged.
    pub fn update(&mut self, source_id: &str, amount: Score, is_delta: bool) -> Result<Score, LedgerError> {
        let score = self
            .scores
            .get_mut(source_id)
            .ok_or_else(|| LedgerError::UnknownSource(source_id.to_string()))?;
        let next = if is_delta { *score + amount } else { amount };
        ensure_finite(source_id, next)?;
        *score = next;
        debug!(source = source_id, score = *score, is_delta, "reliability updated");
        Ok(*score)
    }

    pub fn apply(&mut self, update: &ReliabilityUpdate) -> Result<Score, LedgerError> {
        self.update(&update.source_id, update.amount, update.is_delta)
    }

    pub fn get(&self, source_id: &str) -> Result<Score, LedgerError> {
        self.scores
            .get(source_id)
            .copied()
            .ok_or_else(|| LedgerError::UnknownSource(source_id.to_string()))
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.scores.contains_key(source_id)
    }

    pub fn scores(&self) -> &BTreeMap<String, Score> {
        &self.scores
    }

    /// Append `(last_feedback, full table)` to the snapshot trail.
    pub fn snapshot(&self, last_feedback: &str) -> Result<(), LedgerError> {
        self.trail.append(last_feedback, &self.scores)
    }

    pub fn trail(&self) -> &SnapshotTrail {
        &self.trail
    }
}
