//! In-memory ledger

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{ContractError, Ledger, SourceId};

/// Ledger kept in process memory.
///
/// Counts `mark_delivered` calls so tests can assert write behavior.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    delivered: HashMap<SourceId, BTreeSet<u64>>,
    writes: Vec<(SourceId, u64)>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate delivered sequences (not counted as writes).
    pub fn with_delivered(source: &SourceId, sequences: impl IntoIterator<Item = u64>) -> Self {
        let ledger = Self::new();
        ledger
            .lock()
            .delivered
            .entry(source.clone())
            .or_default()
            .extend(sequences);
        ledger
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every `mark_delivered` call, in order
    pub fn writes(&self) -> Vec<(SourceId, u64)> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// Delivered sequences of a source, ascending
    pub fn delivered(&self, source: &SourceId) -> Vec<u64> {
        self.lock()
            .delivered
            .get(source)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Ledger for MemoryLedger {
    fn max_delivered(&self, source: &SourceId) -> Result<Option<u64>, ContractError> {
        Ok(self
            .lock()
            .delivered
            .get(source)
            .and_then(|set| set.last().copied()))
    }

    fn mark_delivered(&self, source: &SourceId, sequence: u64) -> Result<(), ContractError> {
        let mut inner = self.lock();
        inner.writes.push((source.clone(), sequence));
        inner
            .delivered
            .entry(source.clone())
            .or_default()
            .insert(sequence);
        Ok(())
    }
}
