//! Per-endpoint bucket learned from response headers.

use std::time::Duration;

use contracts::{EndpointKey, SinkResponse};
use tokio::time::Instant;

const HEADER_LIMIT: &str = "x-ratelimit-limit";
const HEADER_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_RESET: &str = "x-ratelimit-reset";
const HEADER_RESET_AFTER: &str = "x-ratelimit-reset-after";
const HEADER_BUCKET: &str = "x-ratelimit-bucket";

/// Rate limit state for one endpoint + credential.
///
/// `remaining` never exceeds `limit`, and is only replenished once
/// `reset_at` has passed.
#[derive(Debug, Clone)]
pub struct RateLimitBucket {
    key: EndpointKey,
    bucket_id: Option<String>,
    limit: Option<u32>,
    remaining: Option<u32>,
    reset_at: Option<Instant>,
    last_updated: Instant,
    suspended_until: Option<Instant>,
}

impl RateLimitBucket {
    pub fn new(key: EndpointKey, now: Instant) -> Self {
        Self {
            key,
            bucket_id: None,
            limit: None,
            remaining: None,
            reset_at: None,
            last_updated: now,
            suspended_until: None,
        }
    }

    /// Seed a bucket with known state.
    pub fn with_state(
        key: EndpointKey,
        limit: u32,
        remaining: u32,
        reset_at: Instant,
        now: Instant,
    ) -> Self {
        Self {
            limit: Some(limit),
            remaining: Some(remaining.min(limit)),
            reset_at: Some(reset_at),
            ..Self::new(key, now)
        }
    }

    /// Refresh from `x-ratelimit-*` headers.
    ///
    /// `x-ratelimit-reset-after` (relative) wins over `x-ratelimit-reset`
    /// (absolute epoch seconds, resolved against `unix_now`).
    pub fn update_from_headers(&mut self, response: &SinkResponse, now: Instant, unix_now: f64) {
        if let Some(limit) = parse_header::<u32>(response, HEADER_LIMIT) {
            self.limit = Some(limit);
        }
        if let Some(remaining) = parse_header::<u32>(response, HEADER_REMAINING) {
            self.remaining = Some(remaining);
        }

        let reset_after = parse_header::<f64>(response, HEADER_RESET_AFTER).or_else(|| {
            parse_header::<f64>(response, HEADER_RESET).map(|epoch| epoch - unix_now)
        });
        // out-of-range resets are dropped; a later 429 still suspends the bucket
        if let Some(at) = reset_after
            .and_then(secs_to_duration)
            .and_then(|wait| now.checked_add(wait))
        {
            self.reset_at = Some(at);
        }

        if let Some(id) = response.header(HEADER_BUCKET) {
            self.bucket_id = Some(id.to_string());
        }

        if let (Some(limit), Some(remaining)) = (self.limit, self.remaining) {
            self.remaining = Some(remaining.min(limit));
        }
        self.last_updated = now;
    }

    /// Time to wait before this bucket admits a request, `None` if it can go now.
    ///
    /// Replenishes `remaining` when `reset_at` has passed.
    pub fn wait_time(&mut self, now: Instant) -> Option<Duration> {
        if let Some(until) = self.suspended_until {
            if now < until {
                return Some(until - now);
            }
            self.suspended_until = None;
        }

        let reset_at = self.reset_at?;
        if now >= reset_at {
            self.remaining = self.limit;
            self.reset_at = None;
            return None;
        }
        match self.remaining {
            Some(0) => Some(reset_at - now),
            _ => None,
        }
    }

    /// Optimistic decrement after a successful send.
    pub fn consume(&mut self) {
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }

    /// Block this bucket until `until` (bucket-scoped 429).
    pub fn suspend_until(&mut self, until: Instant) {
        self.suspended_until = Some(self.suspended_until.map_or(until, |cur| cur.max(until)));
    }

    pub fn key(&self) -> &EndpointKey {
        &self.key
    }

    pub fn bucket_id(&self) -> Option<&str> {
        self.bucket_id.as_deref()
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    pub fn reset_after(&self, now: Instant) -> Duration {
        self.reset_at
            .map(|at| at.saturating_duration_since(now))
            .unwrap_or_default()
    }

    pub fn suspended_for(&self, now: Instant) -> Option<Duration> {
        self.suspended_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    pub fn last_updated(&self) -> Instant {
        self.last_updated
    }
}

fn parse_header<T: std::str::FromStr>(response: &SinkResponse, name: &str) -> Option<T> {
    response.header(name).and_then(|v| v.trim().parse().ok())
}

/// Longest wait an upstream header or body may impose.
pub(crate) const MAX_UPSTREAM_DELAY: Duration = Duration::from_secs(3600);

/// Upstream seconds to a duration. Negatives become zero; NaN and values
/// beyond [`MAX_UPSTREAM_DELAY`] are rejected.
pub(crate) fn secs_to_duration(secs: f64) -> Option<Duration> {
    if secs.is_nan() {
        return None;
    }
    if secs <= 0.0 {
        return Some(Duration::ZERO);
    }
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|wait| *wait <= MAX_UPSTREAM_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> EndpointKey {
        EndpointKey::new("POST:webhook:1:abcdefgh")
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_bucket_never_waits() {
        let now = Instant::now();
        let mut bucket = RateLimitBucket::new(key(), now);
        assert_eq!(bucket.wait_time(now), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_bucket_waits_until_reset() {
        let now = Instant::now();
        let response = SinkResponse::new(204)
            .with_header("X-RateLimit-Limit", "5")
            .with_header("X-RateLimit-Remaining", "0")
            .with_header("X-RateLimit-Reset-After", "2.0")
            .with_header("X-RateLimit-Bucket", "abc123");

        let mut bucket = RateLimitBucket::new(key(), now);
        bucket.update_from_headers(&response, now, 1_700_000_000.0);

        assert_eq!(bucket.bucket_id(), Some("abc123"));
        assert_eq!(bucket.wait_time(now), Some(Duration::from_secs(2)));

        let after_reset = now + Duration::from_secs(2);
        assert_eq!(bucket.wait_time(after_reset), None);
        assert_eq!(bucket.remaining(), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_absolute_reset_resolved_against_unix_time() {
        let now = Instant::now();
        let response = SinkResponse::new(200)
            .with_header("x-ratelimit-limit", "5")
            .with_header("x-ratelimit-remaining", "0")
            .with_header("x-ratelimit-reset", "1000.5");

        let mut bucket = RateLimitBucket::new(key(), now);
        bucket.update_from_headers(&response, now, 999.0);
        assert_eq!(bucket.reset_after(now), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_clamped_to_limit() {
        let now = Instant::now();
        let response = SinkResponse::new(200)
            .with_header("x-ratelimit-limit", "5")
            .with_header("x-ratelimit-remaining", "9");

        let mut bucket = RateLimitBucket::new(key(), now);
        bucket.update_from_headers(&response, now, 0.0);
        assert_eq!(bucket.remaining(), Some(5));

        bucket.consume();
        assert_eq!(bucket.remaining(), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_not_replenished_before_reset() {
        let now = Instant::now();
        let mut bucket =
            RateLimitBucket::with_state(key(), 5, 1, now + Duration::from_secs(2), now);
        bucket.consume();
        assert_eq!(bucket.remaining(), Some(0));
        assert_eq!(
            bucket.wait_time(now + Duration::from_secs(1)),
            Some(Duration::from_secs(1))
        );
        assert_eq!(bucket.remaining(), Some(0));
    }

    #[test]
    fn test_secs_to_duration_bounds() {
        assert_eq!(secs_to_duration(-1.0), Some(Duration::ZERO));
        assert_eq!(secs_to_duration(3.5), Some(Duration::from_millis(3500)));
        assert_eq!(secs_to_duration(3600.0), Some(MAX_UPSTREAM_DELAY));
        assert_eq!(secs_to_duration(3600.5), None);
        assert_eq!(secs_to_duration(1e20), None);
        assert_eq!(secs_to_duration(f64::INFINITY), None);
        assert_eq!(secs_to_duration(f64::NAN), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_reset_header_is_ignored() {
        let now = Instant::now();
        let mut bucket = RateLimitBucket::new(key(), now);
        let response = SinkResponse::new(204)
            .with_header(HEADER_LIMIT, "5")
            .with_header(HEADER_REMAINING, "0")
            .with_header(HEADER_RESET_AFTER, "1e20");
        bucket.update_from_headers(&response, now, 1_700_000_000.0);

        assert_eq!(bucket.remaining(), Some(0));
        assert_eq!(bucket.reset_after(now), Duration::ZERO);
        assert_eq!(bucket.wait_time(now), None);
    }
}
