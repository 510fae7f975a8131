use thiserror::Error;

use crate::record::{RecordKind, Score};

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq)]
pub enum TypeError {
    #[error("reliability score {score} is not allowed on a {kind} record (expected -1)")]
    ScoreNotApplicable { kind: RecordKind, score: Score },

    #[error("invalid history entry: {0}")]
    InvalidHistory(String),

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
