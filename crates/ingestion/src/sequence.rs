//! SequenceTracker - per-source feed continuity
//!
//! Tracks the highest processed sequence and the sequences known to be
//! secondary components of grouped-media records, and decides per observed
//! record whether to deliver, skip, or placeholder the ids in between.

use std::collections::BTreeSet;

/// Grouped ids further than this below `last_processed` are forgotten
const GROUPED_RETENTION: u64 = 1_000;

/// What to do with an observed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// New record, hand it to the delivery pipeline
    Deliver,
    /// Secondary component of an already handled grouped record
    SkipGroupedComponent,
    /// The ledger already holds this sequence or a later one
    SkipDelivered,
}

impl Action {
    /// Metric label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deliver => "deliver",
            Self::SkipGroupedComponent => "grouped_component",
            Self::SkipDelivered => "skipped",
        }
    }
}

/// Decision for one observed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Missing ids to placeholder before the record, ascending
    pub gaps: Vec<u64>,
    pub action: Action,
}

/// Per-source cursor and grouped-range bookkeeping
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    last_processed: u64,
    grouped: BTreeSet<u64>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a known cursor (e.g. the ledger's highest delivered sequence)
    pub fn with_last_processed(last_processed: u64) -> Self {
        Self {
            last_processed,
            grouped: BTreeSet::new(),
        }
    }

    pub fn last_processed(&self) -> u64 {
        self.last_processed
    }

    pub fn grouped_ranges(&self) -> &BTreeSet<u64> {
        &self.grouped
    }

    pub fn is_grouped_component(&self, sequence: u64) -> bool {
        self.grouped.contains(&sequence)
    }

    /// Classify record `sequence` carrying `media_count` combined media items.
    ///
    /// `delivered_floor` is the ledger's highest delivered sequence for the
    /// source. Gap ids at or below it are not placeholdered. Records with
    /// more than one media item register the following `media_count - 1`
    /// ids as grouped components, even when already delivered, so a restart
    /// does not placeholder them.
    ///
    /// Does not move the cursor; call [`advance`](Self::advance) once the
    /// record has been handled.
    pub fn observe(
        &mut self,
        sequence: u64,
        media_count: usize,
        delivered_floor: Option<u64>,
    ) -> Observation {
        if self.grouped.contains(&sequence) {
            return Observation {
                gaps: Vec::new(),
                action: Action::SkipGroupedComponent,
            };
        }

        let gaps = if self.last_processed > 0 && sequence > self.last_processed + 1 {
            (self.last_processed + 1..sequence)
                .filter(|id| !self.grouped.contains(id))
                .filter(|id| delivered_floor.map_or(true, |floor| *id > floor))
                .collect()
        } else {
            Vec::new()
        };

        let action = match delivered_floor {
            Some(floor) if floor >= sequence => Action::SkipDelivered,
            _ => Action::Deliver,
        };

        if media_count > 1 {
            self.register_grouped(sequence, media_count);
        }

        Observation { gaps, action }
    }

    /// Mark `sequence` as processed; never moves the cursor backwards.
    pub fn advance(&mut self, sequence: u64) {
        if sequence <= self.last_processed {
            return;
        }
        self.last_processed = sequence;
        let keep_from = self.last_processed.saturating_sub(GROUPED_RETENTION);
        self.grouped = self.grouped.split_off(&keep_from);
    }

    fn register_grouped(&mut self, sequence: u64, media_count: usize) {
        let last_component = sequence.saturating_add(media_count as u64 - 1);
        // ids at or below the cursor were already seen or placeholdered
        let first = (sequence + 1).max(self.last_processed + 1);
        self.grouped.extend(first..=last_component);
    }
}
