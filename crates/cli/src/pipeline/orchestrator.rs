//! Relay orchestrator - one ingestion loop per source.
//!
//! Every loop gets its own feed reader, sink and media fetcher; the rate
//! limiter and the ledger are shared.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, RelayConfig};
use contracts::{Ledger, SourceConfig, SourceId, WebhookSink};
use dispatcher::{
    DeliveryPipeline, DiscordWebhookSink, HttpMediaFetcher, LogSink, MediaOptions, UnitPlanner,
};
use feed_reader::{FeedOptions, TelegramFeed};
use ingestion::{CycleReport, IngestionLoop};
use ledger::SqliteLedger;
use rate_limiter::{CancellationToken, RateLimiter};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::{RunStats, SourceStats};
use crate::error::CliError;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Validated relay configuration
    pub config: RelayConfig,

    /// Log units instead of posting them
    pub dry_run: bool,

    /// Single cycle per source
    pub once: bool,
}

/// Main relay orchestrator
pub struct Relay {
    settings: RelaySettings,
}

impl Relay {
    pub fn new(settings: RelaySettings) -> Self {
        Self { settings }
    }

    /// Run every source until `shutdown` (or a single cycle with `once`).
    ///
    /// `abort` cancels rate limit and backoff waits of records in flight.
    pub async fn run(
        self,
        shutdown: CancellationToken,
        abort: CancellationToken,
    ) -> Result<RunStats> {
        let start_time = Instant::now();
        let config = &self.settings.config;

        let limiter = Arc::new(RateLimiter::new(&config.limiter));
        let ledger: Arc<dyn Ledger> = Arc::new(
            SqliteLedger::open(&config.ledger.path).with_context(|| {
                format!("Failed to open ledger at {}", config.ledger.path.display())
            })?,
        );
        let color = ConfigLoader::resolve_embed_color(&config.delivery)
            .context("Invalid embed colour")?;
        info!(color = format!("{color:06x}"), "Embed colour selected");

        let mut tasks = JoinSet::new();
        let mut failed = 0usize;

        for source_config in &config.sources {
            let spawned = self.spawn_source(
                &mut tasks,
                source_config,
                color,
                Arc::clone(&limiter),
                Arc::clone(&ledger),
                &shutdown,
                &abort,
            );
            if let Err(e) = spawned {
                error!(channel = %source_config.channel, error = %e, "Source not started");
                failed += 1;
            }
        }

        if tasks.is_empty() {
            return Err(CliError::NoSources { failed }.into());
        }
        info!(
            sources = tasks.len(),
            failed,
            dry_run = self.settings.dry_run,
            once = self.settings.once,
            "Relay running"
        );

        let mut sources = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(stats) => sources.push(stats),
                Err(e) => error!(error = %e, "Source task panicked"),
            }
        }
        sources.sort_by(|a, b| a.source.cmp(&b.source));

        let stats = RunStats {
            duration: start_time.elapsed(),
            sources,
            failed_sources: failed,
            limiter: limiter.status(),
        };
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            delivered = stats.total().delivered,
            "Relay stopped"
        );
        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_source(
        &self,
        tasks: &mut JoinSet<SourceStats>,
        source_config: &SourceConfig,
        color: u32,
        limiter: Arc<RateLimiter>,
        ledger: Arc<dyn Ledger>,
        shutdown: &CancellationToken,
        abort: &CancellationToken,
    ) -> Result<()> {
        let config = &self.settings.config;
        let source = SourceId::parse(&source_config.channel)
            .with_context(|| format!("Invalid channel '{}'", source_config.channel))?;

        let feed = TelegramFeed::new(FeedOptions::from_config(&config.ingestion))
            .map_err(|e| CliError::setup("feed reader", e.to_string()))?;
        let media = HttpMediaFetcher::new(MediaOptions::from_config(&config.delivery))
            .map_err(|e| CliError::setup("media fetcher", e.to_string()))?;
        let planner = UnitPlanner::new(color, config.delivery.placeholder_text.clone());

        if self.settings.dry_run {
            let sink = LogSink::new(source.as_str());
            let pipeline = DeliveryPipeline::new(
                source,
                sink,
                media,
                limiter,
                planner,
                config.delivery.max_retries,
            );
            return self.spawn_loop(tasks, feed, pipeline, ledger, shutdown, abort);
        }

        let (webhook_url, thread_id) = config.target_for(source_config).ok_or_else(|| {
            CliError::setup(source.to_string(), "no webhook url configured")
        })?;
        let sink = DiscordWebhookSink::new(
            source.as_str(),
            webhook_url,
            thread_id,
            config.webhook.timeout(),
        )
        .map_err(|e| CliError::setup("webhook sink", e.to_string()))?;
        info!(
            source = %source,
            endpoint = %sink.endpoint_key(),
            thread = thread_id.unwrap_or("-"),
            "Webhook sink ready"
        );

        let pipeline = DeliveryPipeline::new(
            source,
            sink,
            media,
            limiter,
            planner,
            config.delivery.max_retries,
        );
        self.spawn_loop(tasks, feed, pipeline, ledger, shutdown, abort)
    }

    fn spawn_loop<S>(
        &self,
        tasks: &mut JoinSet<SourceStats>,
        feed: TelegramFeed,
        pipeline: DeliveryPipeline<S, HttpMediaFetcher>,
        ledger: Arc<dyn Ledger>,
        shutdown: &CancellationToken,
        abort: &CancellationToken,
    ) -> Result<()>
    where
        S: WebhookSink + Send + Sync + 'static,
    {
        let poll_interval = self.settings.config.ingestion.poll_interval();
        let mut ingest = IngestionLoop::new(feed, pipeline, ledger, poll_interval)
            .map_err(|e| CliError::setup("ingestion loop", e.to_string()))?;

        let once = self.settings.once;
        let shutdown = shutdown.clone();
        let abort = abort.clone();

        tasks.spawn(async move {
            let report = if once {
                ingest.run_cycle(&shutdown, &abort).await
            } else {
                ingest.run(&shutdown, &abort).await
            };
            if report.cancelled {
                warn!(source = %ingest.source(), "Source aborted mid-record");
            }
            finish(&ingest, report)
        });
        Ok(())
    }
}

fn finish<F, S, M>(ingest: &IngestionLoop<F, S, M>, report: CycleReport) -> SourceStats
where
    F: contracts::FeedSource + Send + Sync,
    S: WebhookSink + Send + Sync,
    M: contracts::MediaFetcher + Send + Sync,
{
    SourceStats {
        source: ingest.source().to_string(),
        last_processed: ingest.tracker().last_processed(),
        report,
        delivery: ingest.pipeline().metrics().snapshot(),
    }
}
