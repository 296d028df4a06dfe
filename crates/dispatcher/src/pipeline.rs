//! DeliveryPipeline - record to ordered units, sent through the rate limiter
//!
//! Single-media records become one embed (plus a video link when the video
//! could not be attached). Grouped records become a main embed, one embed
//! per extra image, then one unit per video. The first irrecoverable unit
//! failure aborts the rest of the record.

use std::sync::Arc;

use contracts::{
    Attachment, DeliveryUnit, FailureKind, MediaFetcher, MediaKind, MessageRecord, SourceId,
    WebhookSink,
};
use rate_limiter::{CancellationToken, DeliveryError, RateLimiter};
use tracing::{debug, info, instrument, warn};

use crate::error::DispatchError;
use crate::metrics::DeliveryMetrics;
use crate::units::UnitPlanner;

/// Result of delivering one record (or placeholder)
#[derive(Debug)]
pub enum RecordOutcome {
    /// Every unit was sent
    Delivered { units: usize },
    /// The first unit was sent, a later one failed; remaining units aborted
    Partial { units: usize, error: DispatchError },
    /// Nothing visible was sent
    Failed(DispatchError),
}

impl RecordOutcome {
    /// Whether the record counts as delivered in the ledger.
    ///
    /// Partial records are marked too: their main unit is already visible
    /// and resending would duplicate it.
    pub fn should_mark(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    pub fn units_sent(&self) -> usize {
        match self {
            Self::Delivered { units } | Self::Partial { units, .. } => *units,
            Self::Failed(_) => 0,
        }
    }

    pub fn error(&self) -> Option<&DispatchError> {
        match self {
            Self::Delivered { .. } => None,
            Self::Partial { error, .. } | Self::Failed(error) => Some(error),
        }
    }

    /// Whether a shutdown abort interrupted delivery
    pub fn is_cancelled(&self) -> bool {
        self.error()
            .and_then(DispatchError::delivery)
            .is_some_and(DeliveryError::is_cancelled)
    }

    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::Partial { .. } => "partial",
            Self::Failed(_) => "failed",
        }
    }

    fn aborted(sequence: u64, units: usize, err: DeliveryError) -> Self {
        let error = DispatchError::unit(sequence, units, err);
        if units == 0 {
            Self::Failed(error)
        } else {
            Self::Partial { units, error }
        }
    }
}

/// Per-source delivery engine
pub struct DeliveryPipeline<S, M> {
    source: SourceId,
    sink: S,
    media: M,
    limiter: Arc<RateLimiter>,
    planner: UnitPlanner,
    max_retries: u32,
    metrics: Arc<DeliveryMetrics>,
}

impl<S, M> DeliveryPipeline<S, M>
where
    S: WebhookSink + Sync,
    M: MediaFetcher + Sync,
{
    pub fn new(
        source: SourceId,
        sink: S,
        media: M,
        limiter: Arc<RateLimiter>,
        planner: UnitPlanner,
        max_retries: u32,
    ) -> Self {
        Self {
            source,
            sink,
            media,
            limiter,
            planner,
            max_retries,
            metrics: Arc::new(DeliveryMetrics::new()),
        }
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn metrics(&self) -> Arc<DeliveryMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Deliver every unit of `record`, in order.
    #[instrument(
        name = "deliver_record",
        skip_all,
        fields(
            source = %record.source_id,
            sequence = record.sequence,
            grouped = record.is_grouped()
        )
    )]
    pub async fn deliver_record(
        &self,
        record: &MessageRecord,
        cancel: &CancellationToken,
    ) -> RecordOutcome {
        let outcome = if record.is_grouped() {
            self.deliver_grouped(record, cancel).await
        } else {
            self.deliver_single(record, cancel).await
        };

        match &outcome {
            RecordOutcome::Delivered { units } => {
                self.metrics.inc_records_delivered();
                info!(units, "Record delivered");
            }
            RecordOutcome::Partial { units, error } => {
                self.metrics.inc_records_partial();
                warn!(units, error = %error, "Record partially delivered");
            }
            RecordOutcome::Failed(error) => {
                self.metrics.inc_records_failed();
                warn!(error = %error, "Record delivery failed");
            }
        }
        outcome
    }

    /// Send the placeholder standing in for sequence `gap`.
    #[instrument(
        name = "deliver_placeholder",
        skip_all,
        fields(source = %record.source_id, gap = gap)
    )]
    pub async fn deliver_placeholder(
        &self,
        record: &MessageRecord,
        gap: u64,
        cancel: &CancellationToken,
    ) -> RecordOutcome {
        let unit = self.planner.placeholder(record, gap);
        match self.send(&unit, cancel).await {
            Ok(()) => {
                self.metrics.inc_placeholders_sent();
                observability::record_placeholder(self.source.as_str());
                info!("Placeholder sent");
                RecordOutcome::Delivered { units: 1 }
            }
            Err(err) => RecordOutcome::aborted(gap, 0, err),
        }
    }

    async fn deliver_single(
        &self,
        record: &MessageRecord,
        cancel: &CancellationToken,
    ) -> RecordOutcome {
        let image = match self
            .fetch_media(record.image.as_deref(), MediaKind::Image, cancel)
            .await
        {
            Ok(image) => image,
            Err(err) => return RecordOutcome::aborted(record.sequence, 0, err),
        };
        let video = match self
            .fetch_media(record.video.as_deref(), MediaKind::Video, cancel)
            .await
        {
            Ok(video) => video,
            Err(err) => return RecordOutcome::aborted(record.sequence, 0, err),
        };
        let mut video_attached = video.is_some();

        let unit = self.planner.single(record, image.clone(), video);
        if let Err(err) = self.send(&unit, cancel).await {
            // rejected upload: resend without the video and link it afterwards
            if !(video_attached && err.kind() == Some(FailureKind::Rejected)) {
                return RecordOutcome::aborted(record.sequence, 0, err);
            }
            warn!(error = %err, "Upload with video rejected, resending without it");
            video_attached = false;
            let unit = self.planner.single(record, image, None);
            if let Err(err) = self.send(&unit, cancel).await {
                return RecordOutcome::aborted(record.sequence, 0, err);
            }
        }

        let mut units = 1;
        if let (Some(url), false) = (record.video.as_deref(), video_attached) {
            let link = self.planner.single_video_link(record, url);
            if let Err(err) = self.send(&link, cancel).await {
                return RecordOutcome::aborted(record.sequence, units, err);
            }
            units += 1;
        }
        RecordOutcome::Delivered { units }
    }

    async fn deliver_grouped(
        &self,
        record: &MessageRecord,
        cancel: &CancellationToken,
    ) -> RecordOutcome {
        let first = match self
            .fetch_media(record.images.first().map(String::as_str), MediaKind::Image, cancel)
            .await
        {
            Ok(first) => first,
            Err(err) => return RecordOutcome::aborted(record.sequence, 0, err),
        };
        let main = self.planner.grouped_main(record, first);
        if let Err(err) = self.send(&main, cancel).await {
            return RecordOutcome::aborted(record.sequence, 0, err);
        }
        let mut units = 1;

        let total_images = record.images.len();
        for (position, url) in record.images.iter().enumerate().skip(1) {
            let index = position + 1;
            let image = match self.fetch_media(Some(url.as_str()), MediaKind::Image, cancel).await {
                Ok(Some(image)) => image,
                Ok(None) => {
                    warn!(index, total_images, "Skipping image that could not be downloaded");
                    continue;
                }
                Err(err) => return RecordOutcome::aborted(record.sequence, units, err),
            };
            let unit = self.planner.grouped_image(record, index, total_images, image);
            if let Err(err) = self.send(&unit, cancel).await {
                return RecordOutcome::aborted(record.sequence, units, err);
            }
            units += 1;
        }

        let total_videos = record.videos.len();
        for (position, url) in record.videos.iter().enumerate() {
            let index = position + 1;
            let video = match self.fetch_media(Some(url.as_str()), MediaKind::Video, cancel).await {
                Ok(video) => video,
                Err(err) => return RecordOutcome::aborted(record.sequence, units, err),
            };
            if let Some(video) = video {
                let unit = self.planner.grouped_video(record, index, total_videos, video);
                match self.send(&unit, cancel).await {
                    Ok(()) => {
                        units += 1;
                        continue;
                    }
                    Err(err) if err.is_cancelled() => {
                        return RecordOutcome::aborted(record.sequence, units, err);
                    }
                    Err(err) => warn!(index, error = %err, "Video upload failed, sending link"),
                }
            }

            let link = self.planner.grouped_video_link(record, index, total_videos, url);
            if let Err(err) = self.send(&link, cancel).await {
                return RecordOutcome::aborted(record.sequence, units, err);
            }
            units += 1;
        }

        RecordOutcome::Delivered { units }
    }

    /// Download `url`, if any. A failed download is `Ok(None)`; only the
    /// abort token turns into an error, dropping the download and its retries.
    async fn fetch_media(
        &self,
        url: Option<&str>,
        kind: MediaKind,
        cancel: &CancellationToken,
    ) -> Result<Option<Attachment>, DeliveryError> {
        let Some(url) = url else {
            return Ok(None);
        };

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(url, kind = %kind, "Download abandoned");
                return Err(DeliveryError::Cancelled);
            }
            fetched = self.media.fetch(url, kind) => fetched,
        };

        match fetched {
            Ok(attachment) => Ok(Some(attachment)),
            Err(err) => {
                self.metrics.inc_media_failures();
                warn!(url, kind = %kind, error = %err, "Media unavailable");
                Ok(None)
            }
        }
    }

    /// One unit through the limiter's send-with-retry cycle
    async fn send(
        &self,
        unit: &DeliveryUnit,
        cancel: &CancellationToken,
    ) -> Result<(), DeliveryError> {
        let key = self.sink.endpoint_key();
        let result = self
            .limiter
            .execute(key, cancel, self.max_retries, || self.sink.send(unit))
            .await;

        match result {
            Ok(response) => {
                self.metrics.inc_units_sent();
                observability::record_unit_sent(self.source.as_str(), unit.kind());
                debug!(status = response.status, kind = unit.kind(), "Unit sent");
                Ok(())
            }
            Err(err) => {
                if !err.is_cancelled() {
                    self.metrics.inc_units_failed();
                    observability::record_unit_failed(self.source.as_str(), err.reason());
                }
                warn!(kind = unit.kind(), endpoint = %key, error = %err, "Unit not sent");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{RecordingSink, ScriptedMediaFetcher};
    use contracts::{EmbedUnit, LimiterConfig, SinkResponse, DEFAULT_PLACEHOLDER_TEXT};
    use serde_json::json;
    use std::time::Duration;

    fn pipeline(
        sink: RecordingSink,
        media: ScriptedMediaFetcher,
    ) -> DeliveryPipeline<RecordingSink, ScriptedMediaFetcher> {
        let limiter = Arc::new(RateLimiter::new(&LimiterConfig::default()));
        DeliveryPipeline::new(
            SourceId::new("chan"),
            sink,
            media,
            limiter,
            UnitPlanner::new(0x123456, DEFAULT_PLACEHOLDER_TEXT),
            3,
        )
    }

    fn embed(unit: &DeliveryUnit) -> &EmbedUnit {
        match unit {
            DeliveryUnit::Embed(embed) => embed,
            DeliveryUnit::PlainLink(link) => panic!("expected embed, got {link:?}"),
        }
    }

    fn content(unit: &DeliveryUnit) -> &str {
        match unit {
            DeliveryUnit::PlainLink(link) => &link.content,
            DeliveryUnit::Embed(embed) => panic!("expected link, got {embed:?}"),
        }
    }

    #[tokio::test]
    async fn test_single_with_image_and_video() {
        let sink = RecordingSink::new("s");
        let p = pipeline(sink.clone(), ScriptedMediaFetcher::new());
        let record = MessageRecord::new("chan".into(), 7)
            .with_text("hi")
            .with_images(["https://cdn/a.jpg"])
            .with_videos(["https://cdn/v.mp4"]);

        let outcome = p.deliver_record(&record, &CancellationToken::new()).await;
        assert!(matches!(outcome, RecordOutcome::Delivered { units: 1 }));

        let sent = sink.delivered();
        assert_eq!(sent.len(), 1);
        let unit = embed(&sent[0]);
        assert!(unit.image.is_some());
        assert!(unit.video.is_some());
        assert_eq!(unit.description.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_single_video_download_failure_sends_link() {
        let sink = RecordingSink::new("s");
        let media = ScriptedMediaFetcher::new();
        media.fail("https://cdn/v.mp4");
        let p = pipeline(sink.clone(), media);
        let record = MessageRecord::new("chan".into(), 7).with_videos(["https://cdn/v.mp4"]);

        let outcome = p.deliver_record(&record, &CancellationToken::new()).await;
        assert!(matches!(outcome, RecordOutcome::Delivered { units: 2 }));

        let sent = sink.delivered();
        assert!(embed(&sent[0]).video.is_none());
        assert_eq!(
            content(&sent[1]),
            "[Attached video](https://cdn/v.mp4)\n[Message Link](<https://t.me/chan/7>)"
        );
        assert_eq!(p.metrics().snapshot().media_failures, 1);
    }

    #[tokio::test]
    async fn test_single_rejected_video_upload_falls_back_to_link() {
        let sink = RecordingSink::new("s");
        sink.respond_when(|unit| match unit {
            DeliveryUnit::Embed(embed) if embed.video.is_some() => Some(SinkResponse::new(413)),
            _ => None,
        });
        let p = pipeline(sink.clone(), ScriptedMediaFetcher::new());
        let record = MessageRecord::new("chan".into(), 7).with_videos(["https://cdn/v.mp4"]);

        let outcome = p.deliver_record(&record, &CancellationToken::new()).await;
        assert!(matches!(outcome, RecordOutcome::Delivered { units: 2 }));
        assert_eq!(sink.attempts().len(), 3);
        let sent = sink.delivered();
        assert!(embed(&sent[0]).video.is_none());
        assert!(content(&sent[1]).starts_with("[Attached video]"));
    }

    #[tokio::test]
    async fn test_grouped_order() {
        let sink = RecordingSink::new("s");
        let p = pipeline(sink.clone(), ScriptedMediaFetcher::new());
        let record = MessageRecord::new("chan".into(), 50)
            .with_text("album")
            .with_images(["https://cdn/1.jpg", "https://cdn/2.jpg", "https://cdn/3.jpg"])
            .with_videos(["https://cdn/v.mp4"]);

        let outcome = p.deliver_record(&record, &CancellationToken::new()).await;
        assert!(matches!(outcome, RecordOutcome::Delivered { units: 4 }));

        let sent = sink.delivered();
        assert_eq!(embed(&sent[0]).title, "Grouped Media Message");
        assert_eq!(embed(&sent[1]).footer.as_deref(), Some("Image 2 of 3"));
        assert_eq!(embed(&sent[2]).footer.as_deref(), Some("Image 3 of 3"));
        assert_eq!(embed(&sent[3]).footer.as_deref(), Some("Video 1 of 1"));
    }

    #[tokio::test]
    async fn test_grouped_skips_missing_image_and_links_failed_video() {
        let sink = RecordingSink::new("s");
        let media = ScriptedMediaFetcher::new();
        media.fail("https://cdn/2.jpg");
        media.fail("https://cdn/v2.mp4");
        let p = pipeline(sink.clone(), media);
        let record = MessageRecord::new("chan".into(), 50)
            .with_images(["https://cdn/1.jpg", "https://cdn/2.jpg"])
            .with_videos(["https://cdn/v1.mp4", "https://cdn/v2.mp4"]);

        let outcome = p.deliver_record(&record, &CancellationToken::new()).await;
        assert!(matches!(outcome, RecordOutcome::Delivered { units: 3 }));

        let sent = sink.delivered();
        assert_eq!(embed(&sent[1]).footer.as_deref(), Some("Video 1 of 2"));
        assert_eq!(
            content(&sent[2]),
            "🎥 **Video** [**2**](https://cdn/v2.mp4) of 2\n[Message Link](<https://t.me/chan/50>)"
        );
    }

    #[tokio::test]
    async fn test_first_unit_failure_aborts_record() {
        let sink = RecordingSink::new("s");
        sink.push_response(SinkResponse::new(404));
        let p = pipeline(sink.clone(), ScriptedMediaFetcher::new());
        let record = MessageRecord::new("chan".into(), 50)
            .with_images(["https://cdn/1.jpg", "https://cdn/2.jpg"]);

        let outcome = p.deliver_record(&record, &CancellationToken::new()).await;
        assert!(matches!(outcome, RecordOutcome::Failed(_)));
        assert!(!outcome.should_mark());
        assert_eq!(sink.attempts().len(), 1);
        assert_eq!(p.metrics().snapshot().records_failed, 1);
    }

    #[tokio::test]
    async fn test_later_unit_failure_is_partial() {
        let sink = RecordingSink::new("s");
        sink.push_response(SinkResponse::new(204));
        sink.push_response(SinkResponse::new(403));
        let p = pipeline(sink.clone(), ScriptedMediaFetcher::new());
        let record = MessageRecord::new("chan".into(), 50).with_images([
            "https://cdn/1.jpg",
            "https://cdn/2.jpg",
            "https://cdn/3.jpg",
        ]);

        let outcome = p.deliver_record(&record, &CancellationToken::new()).await;
        assert!(matches!(outcome, RecordOutcome::Partial { units: 1, .. }));
        assert!(outcome.should_mark());
        // third image never attempted
        assert_eq!(sink.attempts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_unit_is_retried() {
        let sink = RecordingSink::new("s");
        sink.push_response(
            SinkResponse::new(429).with_body(json!({ "retry_after": 0.5, "global": false })),
        );
        let p = pipeline(sink.clone(), ScriptedMediaFetcher::new());
        let record = MessageRecord::new("chan".into(), 1).with_text("x");

        let start = tokio::time::Instant::now();
        let outcome = p.deliver_record(&record, &CancellationToken::new()).await;
        assert!(matches!(outcome, RecordOutcome::Delivered { units: 1 }));
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert_eq!(sink.attempts().len(), 2);
    }

    #[tokio::test]
    async fn test_placeholder_delivery() {
        let sink = RecordingSink::new("s");
        let p = pipeline(sink.clone(), ScriptedMediaFetcher::new());
        let record = MessageRecord::new("chan".into(), 103).with_text("real");

        let outcome = p
            .deliver_placeholder(&record, 101, &CancellationToken::new())
            .await;
        assert!(matches!(outcome, RecordOutcome::Delivered { units: 1 }));

        let sent = sink.delivered();
        let unit = embed(&sent[0]);
        assert_eq!(unit.link, "https://t.me/chan/101");
        assert_eq!(unit.description.as_deref(), Some(DEFAULT_PLACEHOLDER_TEXT));
        assert_eq!(p.metrics().snapshot().placeholders_sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_backoff() {
        let sink = RecordingSink::new("s");
        sink.push_response(SinkResponse::new(503));
        let p = pipeline(sink.clone(), ScriptedMediaFetcher::new());
        let record = MessageRecord::new("chan".into(), 1);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let outcome = p.deliver_record(&record, &cancel).await;
        assert!(matches!(outcome, RecordOutcome::Failed(_)));
        assert!(outcome.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_video_download() {
        let sink = RecordingSink::new("s");
        let media = ScriptedMediaFetcher::new();
        media.delay("https://cdn/v1.mp4", Duration::from_secs(90));
        let p = pipeline(sink.clone(), media);
        let record = MessageRecord::new("chan".into(), 8)
            .with_images(["https://cdn/a.jpg"])
            .with_videos(["https://cdn/v1.mp4", "https://cdn/v2.mp4"]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        let outcome = p.deliver_record(&record, &cancel).await;
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(outcome.is_cancelled());
        // the main unit went out before the download started
        assert!(matches!(outcome, RecordOutcome::Partial { units: 1, .. }));
        assert_eq!(sink.attempts().len(), 1);
        assert_eq!(p.metrics().snapshot().media_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_single_image_download() {
        let sink = RecordingSink::new("s");
        let p = pipeline(sink.clone(), ScriptedMediaFetcher::new());
        let record = MessageRecord::new("chan".into(), 9).with_images(["https://cdn/a.jpg"]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = p.deliver_record(&record, &cancel).await;
        assert!(matches!(outcome, RecordOutcome::Failed(_)));
        assert!(outcome.is_cancelled());
        assert!(sink.attempts().is_empty());
    }
}
