//! Ingestion error types

use thiserror::Error;

/// Startup errors that stop a source's loop.
///
/// Everything that goes wrong once the loop runs (fetch failures, ledger
/// hiccups, undeliverable records) is logged and retried next cycle.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Source identifier cannot be polled
    #[error("unusable source '{source_id}': {message}")]
    InvalidSource {
        /// Source ID as configured
        source_id: String,
        /// Error message
        message: String,
    },

    /// Ledger could not be read to resume the cursor
    #[error("ledger unavailable for source '{source_id}': {message}")]
    LedgerUnavailable {
        /// Source ID
        source_id: String,
        /// Error message
        message: String,
    },
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
