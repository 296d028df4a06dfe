//! # Integration Tests
//!
//! Cross-crate end-to-end tests.
//!
//! Covers:
//! - Config snapshot checks
//! - Scripted feed -> ingestion loop -> delivery pipeline -> recording sink
//! - Ledger persistence across restarts
//! - Shared rate limiter across sources

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_example_config_loads() {
        let config = ConfigLoader::load_from_str(
            r#"
[webhook]
url = "https://discord.com/api/webhooks/1/abcdefghij"

[[sources]]
channel = "durov"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(config.limiter.global_limit, 50);
        assert_eq!(config.limiter.global_window_ms, 1000);
        assert_eq!(config.limiter.invalid_request_limit, 9000);
        assert_eq!(config.ingestion.poll_interval_secs, 300);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        DeliveryUnit, EmbedUnit, LimiterConfig, MessageRecord, SinkResponse, SourceId,
        DEFAULT_PLACEHOLDER_TEXT,
    };
    use dispatcher::units::LINK_TITLE;
    use dispatcher::{DeliveryPipeline, RecordingSink, ScriptedMediaFetcher, UnitPlanner};
    use ingestion::{IngestionLoop, ScriptedFeed};
    use ledger::{MemoryLedger, SqliteLedger};
    use rate_limiter::{CancellationToken, RateLimiter};

    type Loop = IngestionLoop<ScriptedFeed, RecordingSink, ScriptedMediaFetcher>;

    struct Harness {
        feed: ScriptedFeed,
        sink: RecordingSink,
        media: ScriptedMediaFetcher,
        ledger: Arc<MemoryLedger>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_ledger(MemoryLedger::new())
        }

        fn with_ledger(ledger: MemoryLedger) -> Self {
            Self {
                feed: ScriptedFeed::new(),
                sink: RecordingSink::new("e2e"),
                media: ScriptedMediaFetcher::new(),
                ledger: Arc::new(ledger),
            }
        }

        fn start(&self) -> Loop {
            let limiter = Arc::new(RateLimiter::new(&LimiterConfig::default()));
            self.start_with(limiter)
        }

        fn start_with(&self, limiter: Arc<RateLimiter>) -> Loop {
            let pipeline = DeliveryPipeline::new(
                source(),
                self.sink.clone(),
                self.media.clone(),
                limiter,
                UnitPlanner::new(0x89a7d9, DEFAULT_PLACEHOLDER_TEXT),
                3,
            );
            IngestionLoop::new(
                self.feed.clone(),
                pipeline,
                self.ledger.clone(),
                Duration::from_secs(300),
            )
            .unwrap()
        }
    }

    fn source() -> SourceId {
        SourceId::new("durov")
    }

    fn text(sequence: u64) -> MessageRecord {
        MessageRecord::new(source(), sequence).with_text(format!("post {sequence}"))
    }

    fn grouped(sequence: u64, images: usize) -> MessageRecord {
        let urls: Vec<String> = (1..=images)
            .map(|i| format!("https://cdn.example/{sequence}/{i}.jpg"))
            .collect();
        MessageRecord::new(source(), sequence)
            .with_text("album")
            .with_images(urls)
    }

    fn embed(unit: &DeliveryUnit) -> &EmbedUnit {
        match unit {
            DeliveryUnit::Embed(embed) => embed,
            DeliveryUnit::PlainLink(link) => panic!("expected embed, got {link:?}"),
        }
    }

    async fn cycle(ingest: &mut Loop) -> ingestion::CycleReport {
        let token = CancellationToken::new();
        ingest.run_cycle(&token, &token).await
    }

    #[tokio::test]
    async fn test_gap_is_filled_with_placeholders() {
        let h = Harness::new();
        h.feed.push_page(vec![text(100)]);
        h.feed.push_page(vec![text(100), text(103)]);
        let mut ingest = h.start();

        cycle(&mut ingest).await;
        let report = cycle(&mut ingest).await;
        assert_eq!(report.placeholders, 2);
        assert_eq!(report.delivered, 1);

        let sent = h.sink.delivered();
        assert_eq!(sent.len(), 4);
        for (unit, gap) in sent[1..3].iter().zip([101, 102]) {
            let unit = embed(unit);
            assert_eq!(unit.title, LINK_TITLE);
            assert_eq!(unit.link, format!("https://t.me/durov/{gap}"));
            assert_eq!(unit.description.as_deref(), Some(DEFAULT_PLACEHOLDER_TEXT));
            assert!(unit.image.is_none());
        }
        assert_eq!(embed(&sent[3]).description.as_deref(), Some("post 103"));
        assert_eq!(h.ledger.delivered(&source()), vec![100, 101, 102, 103]);
    }

    #[tokio::test]
    async fn test_grouped_components_are_not_placeholdered() {
        let h = Harness::with_ledger(MemoryLedger::with_delivered(&source(), [49]));
        h.feed
            .push_page(vec![grouped(50, 4), text(51), text(52), text(53), text(54)]);
        let mut ingest = h.start();

        let report = cycle(&mut ingest).await;
        assert_eq!(report.placeholders, 0);
        assert_eq!(report.grouped_skipped, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(ingest.tracker().last_processed(), 54);

        // main unit + 3 extra images + record 54
        assert_eq!(h.sink.delivered_count(), 5);
        let footers: Vec<_> = h
            .sink
            .delivered()
            .iter()
            .filter_map(|u| embed(u).footer.clone())
            .collect();
        assert_eq!(footers, vec!["Image 2 of 4", "Image 3 of 4", "Image 4 of 4"]);
        assert_eq!(h.ledger.delivered(&source()), vec![49, 50, 54]);
    }

    #[tokio::test]
    async fn test_replayed_fetch_is_idempotent() {
        let h = Harness::new();
        h.feed.push_page(vec![text(10), grouped(11, 2), text(13)]);
        let mut ingest = h.start();

        cycle(&mut ingest).await;
        let writes = h.ledger.write_count();
        let attempts = h.sink.attempts().len();

        let report = cycle(&mut ingest).await;
        assert_eq!(report.delivered, 0);
        assert_eq!(report.placeholders, 0);
        assert_eq!(h.ledger.write_count(), writes);
        assert_eq!(h.sink.attempts().len(), attempts);
    }

    #[tokio::test]
    async fn test_restart_does_not_repost() {
        let h = Harness::new();
        h.feed.push_page(vec![grouped(50, 3), text(53)]);
        cycle(&mut h.start()).await;
        let attempts = h.sink.attempts().len();
        let writes = h.ledger.write_count();

        // fresh loop, same ledger
        let report = cycle(&mut h.start()).await;
        assert_eq!(report.skipped, 2);
        assert_eq!(report.placeholders, 0);
        assert_eq!(h.sink.attempts().len(), attempts);
        assert_eq!(h.ledger.write_count(), writes);
    }

    #[tokio::test]
    async fn test_each_record_is_marked_once() {
        let h = Harness::new();
        let record = grouped(20, 3).with_videos(["https://cdn.example/20/clip.mp4"]);
        h.media.fail("https://cdn.example/20/clip.mp4");
        h.feed.push_page(vec![record, text(24)]);
        let mut ingest = h.start();

        let report = cycle(&mut ingest).await;
        assert_eq!(report.delivered, 2);
        // main, 2 images, video link fallback, record 24
        assert_eq!(h.sink.delivered_count(), 5);
        assert!(matches!(h.sink.delivered()[3], DeliveryUnit::PlainLink(_)));

        let writes = h.ledger.writes();
        assert_eq!(writes.iter().filter(|(_, s)| *s == 20).count(), 1);
        assert_eq!(writes.iter().filter(|(_, s)| *s == 24).count(), 1);
        assert_eq!(writes.len(), 2);
    }

    #[tokio::test]
    async fn test_partial_record_is_marked_and_not_resent() {
        let h = Harness::new();
        h.sink.respond_when(|unit| match unit {
            DeliveryUnit::Embed(embed) if embed.footer.as_deref() == Some("Image 2 of 3") => {
                Some(SinkResponse::new(404))
            }
            _ => None,
        });
        h.feed.push_page(vec![grouped(30, 3)]);
        let mut ingest = h.start();

        let report = cycle(&mut ingest).await;
        assert_eq!(report.partial, 1);
        // the third image is aborted with the record
        assert_eq!(h.sink.attempts().len(), 2);
        assert_eq!(h.ledger.writes(), vec![(source(), 30)]);

        let again = cycle(&mut ingest).await;
        assert_eq!(again.skipped, 1);
        assert_eq!(h.sink.attempts().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_record_below_floor_is_not_retried() {
        let h = Harness::new();
        h.sink.push_response(SinkResponse::new(403));
        h.feed.push_page(vec![text(5), text(6)]);
        let mut ingest = h.start();

        let first = cycle(&mut ingest).await;
        assert_eq!(first.failed, 1);
        assert_eq!(first.delivered, 1);
        assert_eq!(h.ledger.delivered(&source()), vec![6]);

        // 6 is the ledger floor now, so 5 is not retried
        let second = cycle(&mut ingest).await;
        assert_eq!(second.skipped, 2);
        assert_eq!(h.sink.delivered_count(), 1);
    }

    #[tokio::test]
    async fn test_abort_before_fetch() {
        let h = Harness::new();
        h.feed.push_page(vec![text(1)]);
        let mut ingest = h.start();

        let token = CancellationToken::new();
        token.cancel();
        let report = ingest.run_cycle(&CancellationToken::new(), &token).await;
        assert!(report.cancelled);
        assert_eq!(h.feed.fetches(), 0);
        assert_eq!(h.sink.attempts().len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_unit_is_retried_in_order() {
        let h = Harness::new();
        h.sink.push_response(
            SinkResponse::new(429)
                .with_body(serde_json::json!({ "retry_after": 2.0, "global": false })),
        );
        h.feed.push_page(vec![text(1), text(2)]);
        let mut ingest = h.start();

        let start = tokio::time::Instant::now();
        let report = cycle(&mut ingest).await;
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(report.delivered, 2);

        let sent = h.sink.delivered();
        assert_eq!(embed(&sent[0]).description.as_deref(), Some("post 1"));
        assert_eq!(embed(&sent[1]).description.as_deref(), Some("post 2"));
        assert_eq!(h.ledger.write_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sources_share_the_global_window() {
        let config = LimiterConfig {
            global_limit: 2,
            ..LimiterConfig::default()
        };
        let limiter = Arc::new(RateLimiter::new(&config));

        let a = Harness::new();
        a.feed.push_page(vec![text(1), text(2), text(3)]);
        let mut b = Harness::new();
        b.sink = RecordingSink::new("other");
        b.feed.push_page(vec![text(1), text(2), text(3)]);

        let mut loop_a = a.start_with(Arc::clone(&limiter));
        let mut loop_b = b.start_with(Arc::clone(&limiter));

        let start = tokio::time::Instant::now();
        let (ra, rb) = tokio::join!(cycle(&mut loop_a), cycle(&mut loop_b));
        assert_eq!(ra.delivered + rb.delivered, 6);
        // 6 requests at 2 per second
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(limiter.status().global.limit, 2);
    }

    #[tokio::test]
    async fn test_sqlite_ledger_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let sink = RecordingSink::new("sqlite");
        let feed = ScriptedFeed::with_page(vec![text(7), text(9)]);

        for _ in 0..2 {
            let ledger = Arc::new(SqliteLedger::open(&path).unwrap());
            let pipeline = DeliveryPipeline::new(
                source(),
                sink.clone(),
                ScriptedMediaFetcher::new(),
                Arc::new(RateLimiter::new(&LimiterConfig::default())),
                UnitPlanner::new(0, DEFAULT_PLACEHOLDER_TEXT),
                3,
            );
            let mut ingest =
                IngestionLoop::new(feed.clone(), pipeline, ledger, Duration::from_secs(1)).unwrap();
            cycle(&mut ingest).await;
        }

        // 7, placeholder 8, 9, all from the first run
        assert_eq!(sink.delivered_count(), 3);
    }
}
