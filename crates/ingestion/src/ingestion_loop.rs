//! IngestionLoop - fetch, process, sleep, per source
//!
//! `FETCH -> PROCESS(record...) -> SLEEP -> FETCH`. Fetch failures and
//! undeliverable records are logged and the loop carries on; only startup
//! problems (unusable source, unreadable ledger) are fatal.

use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;

use contracts::{FeedSource, Ledger, MediaFetcher, MessageRecord, SourceId, WebhookSink};
use dispatcher::{DeliveryPipeline, RecordOutcome};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{IngestionError, Result};
use crate::sequence::{Action, SequenceTracker};

/// Counters of one or more cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Records returned by the feed
    pub fetched: u64,
    pub delivered: u64,
    pub partial: u64,
    pub failed: u64,
    /// Already in the ledger
    pub skipped: u64,
    /// Secondary components of grouped records
    pub grouped_skipped: u64,
    pub placeholders: u64,
    pub placeholder_failures: u64,
    pub ledger_errors: u64,
    pub fetch_failures: u64,
    /// Cycles folded into this report
    pub cycles: u64,
    /// Stopped early by the abort token
    pub cancelled: bool,
}

impl AddAssign for CycleReport {
    fn add_assign(&mut self, other: Self) {
        self.fetched += other.fetched;
        self.delivered += other.delivered;
        self.partial += other.partial;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.grouped_skipped += other.grouped_skipped;
        self.placeholders += other.placeholders;
        self.placeholder_failures += other.placeholder_failures;
        self.ledger_errors += other.ledger_errors;
        self.fetch_failures += other.fetch_failures;
        self.cycles += other.cycles;
        self.cancelled |= other.cancelled;
    }
}

/// One monitored source
pub struct IngestionLoop<F, S, M> {
    source: SourceId,
    feed: F,
    pipeline: DeliveryPipeline<S, M>,
    ledger: Arc<dyn Ledger>,
    tracker: SequenceTracker,
    poll_interval: Duration,
}

impl<F, S, M> IngestionLoop<F, S, M>
where
    F: FeedSource + Send + Sync,
    S: WebhookSink + Send + Sync,
    M: MediaFetcher + Send + Sync,
{
    /// Validate the source and resume the cursor from the ledger.
    ///
    /// # Errors
    /// Fails when the pipeline's source id is unusable or the ledger cannot
    /// be read; both are fatal for this source.
    pub fn new(
        feed: F,
        pipeline: DeliveryPipeline<S, M>,
        ledger: Arc<dyn Ledger>,
        poll_interval: Duration,
    ) -> Result<Self> {
        let configured = pipeline.source().clone();
        let source =
            SourceId::parse(configured.as_str()).map_err(|e| IngestionError::InvalidSource {
                source_id: configured.to_string(),
                message: e.to_string(),
            })?;

        let resume_from = ledger
            .max_delivered(&source)
            .map_err(|e| IngestionError::LedgerUnavailable {
                source_id: source.to_string(),
                message: e.to_string(),
            })?
            .unwrap_or(0);
        info!(source = %source, resume_from, "ingestion loop ready");

        Ok(Self {
            source,
            feed,
            pipeline,
            ledger,
            tracker: SequenceTracker::with_last_processed(resume_from),
            poll_interval,
        })
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn tracker(&self) -> &SequenceTracker {
        &self.tracker
    }

    pub fn pipeline(&self) -> &DeliveryPipeline<S, M> {
        &self.pipeline
    }

    /// Run cycles until `shutdown` fires.
    ///
    /// `shutdown` stops new fetches and new records; the record in flight
    /// finishes. `abort` additionally cancels rate limit and backoff waits.
    #[instrument(name = "ingestion_loop", skip_all, fields(source = %self.source))]
    pub async fn run(
        &mut self,
        shutdown: &CancellationToken,
        abort: &CancellationToken,
    ) -> CycleReport {
        let mut total = CycleReport::default();

        while !shutdown.is_cancelled() {
            let report = self.run_cycle(shutdown, abort).await;
            debug!(?report, "cycle finished");
            total += report;
            if report.cancelled {
                break;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(cycles = total.cycles, delivered = total.delivered, "ingestion loop stopped");
        total
    }

    /// One `FETCH -> PROCESS` pass.
    #[instrument(name = "ingestion_cycle", skip_all, fields(source = %self.source))]
    pub async fn run_cycle(
        &mut self,
        shutdown: &CancellationToken,
        abort: &CancellationToken,
    ) -> CycleReport {
        let mut report = CycleReport {
            cycles: 1,
            ..CycleReport::default()
        };

        let fetched = tokio::select! {
            biased;
            _ = abort.cancelled() => {
                report.cancelled = true;
                return report;
            }
            fetched = self.feed.fetch(&self.source) => fetched,
        };

        let records = match fetched {
            Ok(records) => {
                observability::record_feed_fetch(self.source.as_str(), true);
                records
            }
            Err(err) => {
                observability::record_feed_fetch(self.source.as_str(), false);
                warn!(error = %err, "feed fetch failed, retrying next cycle");
                report.fetch_failures += 1;
                return report;
            }
        };
        report.fetched = records.len() as u64;
        debug!(count = records.len(), "records fetched");

        for record in &records {
            if shutdown.is_cancelled() {
                info!(sequence = record.sequence, "shutdown requested, leaving remaining records");
                break;
            }
            self.process_record(record, abort, &mut report).await;
            if report.cancelled {
                break;
            }
        }

        report
    }

    async fn process_record(
        &mut self,
        record: &MessageRecord,
        abort: &CancellationToken,
        report: &mut CycleReport,
    ) {
        let floor = match self.ledger.max_delivered(&self.source) {
            Ok(floor) => floor,
            Err(err) => {
                // leave the cursor alone so the record is retried next cycle
                error!(sequence = record.sequence, error = %err, "ledger read failed");
                report.ledger_errors += 1;
                return;
            }
        };

        let observation = self
            .tracker
            .observe(record.sequence, record.media_count(), floor);

        for gap in observation.gaps {
            let outcome = self.pipeline.deliver_placeholder(record, gap, abort).await;
            if outcome.should_mark() {
                self.mark(gap, report);
                report.placeholders += 1;
            } else if outcome.is_cancelled() {
                report.cancelled = true;
                return;
            } else {
                report.placeholder_failures += 1;
            }
        }

        let source = self.source.as_str();
        match observation.action {
            action @ Action::SkipGroupedComponent => {
                debug!(sequence = record.sequence, "skipping grouped media component");
                report.grouped_skipped += 1;
                observability::record_record_outcome(source, action.as_str());
            }
            action @ Action::SkipDelivered => {
                debug!(sequence = record.sequence, "already delivered");
                report.skipped += 1;
                observability::record_record_outcome(source, action.as_str());
            }
            Action::Deliver => {
                let outcome = self.pipeline.deliver_record(record, abort).await;
                if outcome.should_mark() {
                    self.mark(record.sequence, report);
                }
                match &outcome {
                    RecordOutcome::Delivered { .. } => report.delivered += 1,
                    RecordOutcome::Partial { .. } => report.partial += 1,
                    RecordOutcome::Failed(_) => report.failed += 1,
                }
                observability::record_record_outcome(self.source.as_str(), outcome.label());
                if outcome.is_cancelled() {
                    report.cancelled = true;
                    return;
                }
            }
        }

        self.tracker.advance(record.sequence);
        observability::record_last_processed(self.source.as_str(), self.tracker.last_processed());
    }

    fn mark(&self, sequence: u64, report: &mut CycleReport) {
        if let Err(err) = self.ledger.mark_delivered(&self.source, sequence) {
            error!(sequence, error = %err, "failed to record delivery");
            report.ledger_errors += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedFeed;
    use contracts::{LimiterConfig, SinkResponse, DEFAULT_PLACEHOLDER_TEXT};
    use dispatcher::{RecordingSink, ScriptedMediaFetcher, UnitPlanner};
    use ledger::MemoryLedger;
    use rate_limiter::RateLimiter;

    type TestLoop = IngestionLoop<ScriptedFeed, RecordingSink, ScriptedMediaFetcher>;

    fn build(
        channel: &str,
        feed: ScriptedFeed,
        sink: RecordingSink,
        ledger: Arc<MemoryLedger>,
    ) -> Result<TestLoop> {
        let pipeline = DeliveryPipeline::new(
            SourceId::new(channel),
            sink,
            ScriptedMediaFetcher::new(),
            Arc::new(RateLimiter::new(&LimiterConfig::default())),
            UnitPlanner::new(0xffffff, DEFAULT_PLACEHOLDER_TEXT),
            2,
        );
        IngestionLoop::new(feed, pipeline, ledger, Duration::from_secs(300))
    }

    fn record(sequence: u64) -> MessageRecord {
        MessageRecord::new("chan".into(), sequence).with_text(format!("post {sequence}"))
    }

    #[test]
    fn test_invalid_source_is_fatal() {
        let ledger = Arc::new(MemoryLedger::new());
        let result = build("a b", ScriptedFeed::new(), RecordingSink::new("s"), ledger);
        assert!(matches!(result, Err(IngestionError::InvalidSource { .. })));
    }

    #[tokio::test]
    async fn test_resumes_from_ledger() {
        let source = SourceId::new("chan");
        let ledger = Arc::new(MemoryLedger::with_delivered(&source, [98, 100]));
        let feed = ScriptedFeed::with_page(vec![record(99), record(100), record(101)]);
        let sink = RecordingSink::new("s");
        let mut ingest = build("chan", feed, sink.clone(), ledger.clone()).unwrap();
        assert_eq!(ingest.tracker().last_processed(), 100);

        let token = CancellationToken::new();
        let report = ingest.run_cycle(&token, &token).await;
        assert_eq!(report.skipped, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(sink.delivered_count(), 1);
        assert_eq!(ledger.writes(), vec![(source, 101)]);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_fatal() {
        let feed = ScriptedFeed::new();
        feed.push_error("502 from upstream");
        feed.push_page(vec![record(1)]);
        let sink = RecordingSink::new("s");
        let mut ingest = build("chan", feed, sink.clone(), Arc::new(MemoryLedger::new())).unwrap();

        let token = CancellationToken::new();
        let first = ingest.run_cycle(&token, &token).await;
        assert_eq!(first.fetch_failures, 1);
        let second = ingest.run_cycle(&token, &token).await;
        assert_eq!(second.delivered, 1);
    }

    #[tokio::test]
    async fn test_failed_record_is_not_marked_and_retried() {
        let feed = ScriptedFeed::with_page(vec![record(5)]);
        let sink = RecordingSink::new("s");
        sink.push_response(SinkResponse::new(404));
        let ledger = Arc::new(MemoryLedger::new());
        let mut ingest = build("chan", feed, sink.clone(), ledger.clone()).unwrap();

        let token = CancellationToken::new();
        let first = ingest.run_cycle(&token, &token).await;
        assert_eq!(first.failed, 1);
        assert_eq!(ledger.write_count(), 0);

        let second = ingest.run_cycle(&token, &token).await;
        assert_eq!(second.delivered, 1);
        assert_eq!(ledger.write_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_before_next_record() {
        let feed = ScriptedFeed::with_page(vec![record(1), record(2)]);
        let sink = RecordingSink::new("s");
        let ledger = Arc::new(MemoryLedger::new());
        let mut ingest = build("chan", feed.clone(), sink.clone(), ledger).unwrap();

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let report = ingest.run(&shutdown, &CancellationToken::new()).await;
        assert_eq!(report.cycles, 0);
        assert_eq!(feed.fetches(), 0);
        assert_eq!(sink.delivered_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sleeps_between_cycles() {
        let feed = ScriptedFeed::with_page(vec![record(1)]);
        let sink = RecordingSink::new("s");
        let ledger = Arc::new(MemoryLedger::new());
        let mut ingest = build("chan", feed.clone(), sink.clone(), ledger).unwrap();

        let shutdown = CancellationToken::new();
        let stopper = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(650)).await;
            stopper.cancel();
        });

        let report = ingest.run(&shutdown, &CancellationToken::new()).await;
        // cycles at t=0, 300 and 600
        assert_eq!(report.cycles, 3);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(feed.fetches(), 3);
    }
}
