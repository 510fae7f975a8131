use std::io;

use draglog_store::StoreError;
use draglog_types::{Score, TypeError};

/// Errors produced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("reliability source not initialized: {0}")]
    UnknownSource(String),

    #[error("score for {source_id} is not finite: {score}")]
    NonFiniteScore { source_id: String, score: Score },

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("corrupt snapshot trail at line {line}: {reason}")]
    CorruptSnapshot { line: usize, reason: String },

    #[error("invalid record: {0}")]
    Type(#[from] TypeError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0} is not supported by this ledger")]
    Unsupported(&'static str),
}
