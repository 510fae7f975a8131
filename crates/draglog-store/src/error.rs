use std::io;

/// Errors produced by the append log.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing file could not be opened, read, or written.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A line failed to parse. The whole scan fails; nothing is skipped.
    #[error("corrupt log line at byte offset {offset}: {reason}")]
    CorruptLog { offset: u64, reason: String },

    /// A line could not be encoded for writing.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the store crate.
pub type Result<T> = std::result::Result<T, StoreError>;
