use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("ledger error: {0}")]
    Ledger(#[from] draglog_ledger::LedgerError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
