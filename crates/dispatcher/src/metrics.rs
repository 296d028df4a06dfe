//! In-process delivery counters for the end-of-run summary

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one delivery pipeline
#[derive(Debug, Default)]
pub struct DeliveryMetrics {
    units_sent: AtomicU64,
    units_failed: AtomicU64,
    records_delivered: AtomicU64,
    records_partial: AtomicU64,
    records_failed: AtomicU64,
    placeholders_sent: AtomicU64,
    media_failures: AtomicU64,
}

impl DeliveryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units_sent(&self) -> u64 {
        self.units_sent.load(Ordering::Relaxed)
    }

    pub fn inc_units_sent(&self) {
        self.units_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn units_failed(&self) -> u64 {
        self.units_failed.load(Ordering::Relaxed)
    }

    pub fn inc_units_failed(&self) {
        self.units_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn records_delivered(&self) -> u64 {
        self.records_delivered.load(Ordering::Relaxed)
    }

    pub fn inc_records_delivered(&self) {
        self.records_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn records_partial(&self) -> u64 {
        self.records_partial.load(Ordering::Relaxed)
    }

    pub fn inc_records_partial(&self) {
        self.records_partial.fetch_add(1, Ordering::Relaxed);
    }

    pub fn records_failed(&self) -> u64 {
        self.records_failed.load(Ordering::Relaxed)
    }

    pub fn inc_records_failed(&self) {
        self.records_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn placeholders_sent(&self) -> u64 {
        self.placeholders_sent.load(Ordering::Relaxed)
    }

    pub fn inc_placeholders_sent(&self) {
        self.placeholders_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Downloads that failed after every attempt
    pub fn media_failures(&self) -> u64 {
        self.media_failures.load(Ordering::Relaxed)
    }

    pub fn inc_media_failures(&self) {
        self.media_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            units_sent: self.units_sent(),
            units_failed: self.units_failed(),
            records_delivered: self.records_delivered(),
            records_partial: self.records_partial(),
            records_failed: self.records_failed(),
            placeholders_sent: self.placeholders_sent(),
            media_failures: self.media_failures(),
        }
    }
}

/// Snapshot of delivery metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub units_sent: u64,
    pub units_failed: u64,
    pub records_delivered: u64,
    pub records_partial: u64,
    pub records_failed: u64,
    pub placeholders_sent: u64,
    pub media_failures: u64,
}

impl std::ops::Add for MetricsSnapshot {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            units_sent: self.units_sent + other.units_sent,
            units_failed: self.units_failed + other.units_failed,
            records_delivered: self.records_delivered + other.records_delivered,
            records_partial: self.records_partial + other.records_partial,
            records_failed: self.records_failed + other.records_failed,
            placeholders_sent: self.placeholders_sent + other.placeholders_sent,
            media_failures: self.media_failures + other.media_failures,
        }
    }
}
