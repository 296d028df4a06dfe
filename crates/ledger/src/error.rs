//! Ledger errors

use contracts::ContractError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Sequence does not fit SQLite's signed integer column
    #[error("sequence {0} out of range")]
    SequenceOutOfRange(u64),
}

impl From<LedgerError> for ContractError {
    fn from(err: LedgerError) -> Self {
        ContractError::ledger(err.to_string())
    }
}
