//! RateLimiter - shared gate in front of every webhook request

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{ContractError, EndpointKey, FailureKind, LimiterConfig, SinkResponse};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::decision::{parse_retry_directive, RetryDirective};
use crate::{
    backoff, BucketStatus, Clock, Decision, DeliveryError, GlobalStatus, GlobalWindow,
    InvalidRequestCounter, InvalidRequestStatus, LimiterStatus, RateLimitBucket, RateLimitError,
    RetryScope, TokioClock,
};

/// Process-wide rate limiter.
///
/// Construct once and share through `Arc` with every delivery pipeline that
/// targets the same downstream service. State lives behind one mutex that
/// is never held across a wait.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    max_backoff: Duration,
    state: Mutex<LimiterState>,
}

struct LimiterState {
    global: GlobalWindow,
    buckets: HashMap<EndpointKey, RateLimitBucket>,
    invalid: InvalidRequestCounter,
}

impl RateLimiter {
    /// Create a limiter on the tokio clock
    pub fn new(config: &LimiterConfig) -> Self {
        Self::with_clock(config, Arc::new(TokioClock))
    }

    /// Create a limiter on a custom clock
    pub fn with_clock(config: &LimiterConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let state = LimiterState {
            global: GlobalWindow::new(
                config.global_limit,
                Duration::from_millis(config.global_window_ms),
            ),
            buckets: HashMap::new(),
            invalid: InvalidRequestCounter::new(
                config.invalid_request_limit,
                Duration::from_secs(config.invalid_request_window_secs),
                now,
            ),
        };
        Self {
            clock,
            max_backoff: Duration::from_secs(config.max_backoff_secs),
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until both the global window and the bucket for `key` have capacity,
    /// then record the admission.
    ///
    /// # Errors
    /// Only [`RateLimitError::Cancelled`], when `cancel` fires during a wait
    #[instrument(name = "ratelimit_acquire", skip(self, cancel), fields(endpoint = %key))]
    pub async fn acquire(
        &self,
        key: &EndpointKey,
        cancel: &CancellationToken,
    ) -> Result<(), RateLimitError> {
        loop {
            if cancel.is_cancelled() {
                return Err(RateLimitError::Cancelled);
            }

            let now = self.clock.now();
            let Some((scope, wait)) = self.try_admit(key, now) else {
                return Ok(());
            };

            debug!(
                scope = scope.as_str(),
                wait_ms = wait.as_millis() as u64,
                "Waiting for rate limit capacity"
            );
            observability::record_ratelimit_wait_ms(scope.as_str(), wait.as_secs_f64() * 1000.0);

            // Re-check after waking: other callers may have taken the slot
            self.wait_until(now + wait, cancel).await?;
        }
    }

    fn try_admit(&self, key: &EndpointKey, now: Instant) -> Option<(RetryScope, Duration)> {
        let mut guard = self.lock();
        let state = &mut *guard;

        if let Some(wait) = state.global.wait_time(now) {
            return Some((RetryScope::Global, wait));
        }
        if let Some(bucket) = state.buckets.get_mut(key) {
            if let Some(wait) = bucket.wait_time(now) {
                return Some((RetryScope::Bucket, wait));
            }
        }
        state.global.admit(now);
        None
    }

    async fn wait_until(
        &self,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<(), RateLimitError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(RateLimitError::Cancelled),
            _ = self.clock.sleep_until(deadline) => Ok(()),
        }
    }

    /// Classify a response and update limiter state from it.
    ///
    /// `attempt` is the 0-based retry index and drives 5xx backoff. A 429
    /// suspends the bucket (or the whole window when global), so the next
    /// `acquire` already waits out the delay.
    #[instrument(
        name = "ratelimit_classify",
        skip(self, response),
        fields(endpoint = %key, status = response.status)
    )]
    pub fn classify(&self, key: &EndpointKey, attempt: u32, response: &SinkResponse) -> Decision {
        observability::record_http_response(Some(response.status));

        let now = self.clock.now();
        let unix_now = self.clock.unix_now();
        let mut guard = self.lock();
        let state = &mut *guard;

        let bucket = state
            .buckets
            .entry(key.clone())
            .or_insert_with(|| RateLimitBucket::new(key.clone(), now));
        bucket.update_from_headers(response, now, unix_now);

        match response.status {
            429 => {
                note_invalid(&mut state.invalid, now, response.status);

                let mut directive = parse_retry_directive(response);
                let until = match now.checked_add(directive.delay) {
                    Some(until) => until,
                    None => {
                        directive = RetryDirective::conservative(directive.global);
                        now + directive.delay
                    }
                };
                let scope = if directive.global {
                    state.global.suspend_until(until);
                    RetryScope::Global
                } else {
                    bucket.suspend_until(until);
                    RetryScope::Bucket
                };
                let kind = if directive.malformed {
                    FailureKind::MalformedUpstreamResponse
                } else {
                    FailureKind::RateLimited
                };

                warn!(
                    scope = scope.as_str(),
                    retry_after_ms = directive.delay.as_millis() as u64,
                    malformed = directive.malformed,
                    "Rate limited by endpoint"
                );
                Decision::RetryAfter {
                    delay: directive.delay,
                    scope,
                    kind,
                }
            }
            401 | 403 => {
                note_invalid(&mut state.invalid, now, response.status);
                Decision::PermanentFailure(FailureKind::AuthFailure)
            }
            404 => Decision::PermanentFailure(FailureKind::NotFound),
            status if status >= 500 => Decision::RetryAfter {
                delay: backoff(attempt, self.max_backoff),
                scope: RetryScope::Request,
                kind: FailureKind::ServerError,
            },
            status if status < 400 => {
                bucket.consume();
                Decision::Proceed
            }
            _ => Decision::PermanentFailure(FailureKind::Rejected),
        }
    }

    /// Decision for a request that failed before any response arrived.
    pub fn classify_transport(&self, attempt: u32) -> Decision {
        observability::record_http_response(None);
        Decision::RetryAfter {
            delay: backoff(attempt, self.max_backoff),
            scope: RetryScope::Request,
            kind: FailureKind::TransientNetwork,
        }
    }

    /// Full send-with-retry cycle: acquire, send, classify, wait, repeat.
    ///
    /// `request` is called once per attempt; at most `max_retries + 1`
    /// attempts are made.
    ///
    /// # Errors
    /// - [`DeliveryError::Permanent`] on auth failure, missing target or a rejected payload
    /// - [`DeliveryError::RetriesExhausted`] when the retry budget is spent
    /// - [`DeliveryError::Cancelled`] when `cancel` fires during a wait
    #[instrument(name = "ratelimit_execute", skip(self, cancel, request), fields(endpoint = %key))]
    pub async fn execute<F, Fut>(
        &self,
        key: &EndpointKey,
        cancel: &CancellationToken,
        max_retries: u32,
        mut request: F,
    ) -> Result<SinkResponse, DeliveryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<SinkResponse, ContractError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            self.acquire(key, cancel).await?;

            let decision = match request().await {
                Ok(response) => match self.classify(key, attempt, &response) {
                    Decision::Proceed => return Ok(response),
                    Decision::PermanentFailure(kind) => {
                        let message = describe(&response);
                        warn!(
                            status = response.status,
                            kind = %kind,
                            %message,
                            "Request failed permanently"
                        );
                        return Err(DeliveryError::permanent(kind, Some(response.status), message));
                    }
                    retry => retry,
                },
                Err(err) if err.is_transport() => {
                    warn!(error = %err, attempt, "Request failed before a response");
                    self.classify_transport(attempt)
                }
                Err(err) => {
                    return Err(DeliveryError::permanent(
                        FailureKind::Rejected,
                        None,
                        err.to_string(),
                    ));
                }
            };

            let Decision::RetryAfter { delay, scope, kind } = decision else {
                continue;
            };

            if attempt >= max_retries {
                warn!(attempts = attempt + 1, last = %kind, "Retry budget exhausted");
                return Err(DeliveryError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: kind,
                });
            }

            debug!(
                attempt = attempt + 1,
                max_retries,
                delay_ms = delay.as_millis() as u64,
                scope = scope.as_str(),
                "Retrying request"
            );

            // Global/bucket delays are stored as suspensions and honoured by acquire
            if scope == RetryScope::Request {
                observability::record_ratelimit_wait_ms(
                    scope.as_str(),
                    delay.as_secs_f64() * 1000.0,
                );
                self.wait_until(self.clock.now() + delay, cancel).await?;
            }
            attempt += 1;
        }
    }

    /// Snapshot of every counter
    pub fn status(&self) -> LimiterStatus {
        let now = self.clock.now();
        let mut guard = self.lock();
        let state = &mut *guard;

        let global = GlobalStatus {
            requests_in_window: state.global.in_window(now),
            limit: state.global.limit(),
            window_remaining_secs: state.global.window_remaining(now).as_secs_f64(),
            suspended_secs: state.global.suspended_for(now).map(|d| d.as_secs_f64()),
        };

        let buckets = state
            .buckets
            .iter()
            .map(|(key, bucket)| {
                let status = BucketStatus {
                    bucket_id: bucket.bucket_id().map(str::to_string),
                    limit: bucket.limit(),
                    remaining: bucket.remaining(),
                    reset_after_secs: bucket.reset_after(now).as_secs_f64(),
                    suspended_secs: bucket.suspended_for(now).map(|d| d.as_secs_f64()),
                };
                (key.to_string(), status)
            })
            .collect();

        let invalid_requests = InvalidRequestStatus {
            count: state.invalid.count(now),
            limit: state.invalid.limit(),
            window_remaining_secs: state.invalid.window_remaining(now).as_secs_f64(),
        };

        LimiterStatus {
            global,
            buckets,
            invalid_requests,
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_backoff", &self.max_backoff)
            .finish_non_exhaustive()
    }
}

fn note_invalid(counter: &mut InvalidRequestCounter, now: Instant, status: u16) {
    let count = counter.record(now);
    observability::record_invalid_requests(count);
    if counter.is_near_limit() {
        warn!(
            count,
            limit = counter.limit(),
            status,
            "High invalid request count, risk of endpoint ban"
        );
    }
}

fn describe(response: &SinkResponse) -> String {
    response
        .body
        .as_ref()
        .and_then(|body| body.get("message"))
        .and_then(|message| message.as_str())
        .map(|message| format!("status {}: {}", response.status, message))
        .unwrap_or_else(|| format!("status {}", response.status))
}
