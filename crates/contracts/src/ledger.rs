//! Ledger trait - durable delivery record

use crate::{ContractError, SourceId};

/// Append-only record of delivered sequences per source.
///
/// Implementations must tolerate concurrent callers (one per source).
pub trait Ledger: Send + Sync {
    /// Highest delivered sequence for `source`, if any.
    fn max_delivered(&self, source: &SourceId) -> Result<Option<u64>, ContractError>;

    /// Record `sequence` as delivered. Marking twice is a no-op.
    fn mark_delivered(&self, source: &SourceId, sequence: u64) -> Result<(), ContractError>;
}

impl<T: Ledger + ?Sized> Ledger for std::sync::Arc<T> {
    fn max_delivered(&self, source: &SourceId) -> Result<Option<u64>, ContractError> {
        (**self).max_delivered(source)
    }

    fn mark_delivered(&self, source: &SourceId, sequence: u64) -> Result<(), ContractError> {
        (**self).mark_delivered(source, sequence)
    }
}
