//! Response classification results.

use std::time::Duration;

use contracts::{FailureKind, SinkResponse};
use serde::Deserialize;

use crate::bucket::secs_to_duration;

/// Delay used when a 429 carries no usable retry directive.
pub(crate) const MALFORMED_RETRY_DELAY: Duration = Duration::from_secs(1);

/// What the caller should do with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request accepted
    Proceed,
    /// Retry after `delay`
    RetryAfter {
        delay: Duration,
        scope: RetryScope,
        kind: FailureKind,
    },
    /// Give up on this unit
    PermanentFailure(FailureKind),
}

/// Who the retry delay applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryScope {
    /// Every bucket is suspended; `acquire` already waits for it
    Global,
    /// The responding bucket is suspended; `acquire` already waits for it
    Bucket,
    /// Only the retrying request backs off (5xx, network failure)
    Request,
}

impl RetryScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Bucket => "bucket",
            Self::Request => "backoff",
        }
    }
}

/// Exponential backoff: `min(2^attempt, max)` seconds.
pub fn backoff(attempt: u32, max: Duration) -> Duration {
    let secs = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
    Duration::from_secs(secs).min(max)
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: Option<f64>,
    #[serde(default)]
    global: bool,
}

/// Retry directive of a 429.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RetryDirective {
    pub delay: Duration,
    pub global: bool,
    /// No usable delay was found; `delay` is the conservative default
    pub malformed: bool,
}

/// Read the 429 directive from the JSON body, falling back to `Retry-After`.
pub(crate) fn parse_retry_directive(response: &SinkResponse) -> RetryDirective {
    let body = response
        .body
        .clone()
        .and_then(|value| serde_json::from_value::<RateLimitBody>(value).ok());

    let header_global = response
        .header("x-ratelimit-global")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    let global = header_global || body.as_ref().is_some_and(|b| b.global);

    let from_body = body
        .and_then(|b| b.retry_after)
        .filter(|s| *s >= 0.0)
        .and_then(secs_to_duration);
    let from_header = || {
        response
            .header("retry-after")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|s| *s >= 0.0)
            .and_then(secs_to_duration)
    };

    match from_body.or_else(from_header) {
        Some(delay) => RetryDirective {
            delay,
            global,
            malformed: false,
        },
        None => RetryDirective::conservative(global),
    }
}

impl RetryDirective {
    /// Directive used when the endpoint gave no usable delay.
    pub(crate) fn conservative(global: bool) -> Self {
        Self {
            delay: MALFORMED_RETRY_DELAY,
            global,
            malformed: true,
        }
    }
}
