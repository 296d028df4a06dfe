//! # Rate Limiter
//!
//! Enforces a webhook endpoint's throughput contract and classifies every
//! response into a retry decision.
//!
//! Responsibilities:
//! - Global rolling window shared by every bucket (50 req / 1 s by default)
//! - Per-endpoint buckets learned from `x-ratelimit-*` headers
//! - 429 suspension of a bucket or of the whole window
//! - Invalid request (401/403/429) accounting
//! - Send-with-retry composition, cancellable at every wait
//!
//! ## Example
//!
//! ```ignore
//! use rate_limiter::RateLimiter;
//!
//! let limiter = Arc::new(RateLimiter::new(&config.limiter));
//!
//! let response = limiter
//!     .execute(&key, &abort, config.delivery.max_retries, || sink.send(&unit))
//!     .await?;
//! ```

mod bucket;
mod clock;
mod decision;
mod error;
mod limiter;
mod status;
mod window;

pub use bucket::RateLimitBucket;
pub use clock::{Clock, TokioClock};
pub use decision::{backoff, Decision, RetryScope};
pub use error::{DeliveryError, RateLimitError};
pub use limiter::RateLimiter;
pub use status::{BucketStatus, GlobalStatus, InvalidRequestStatus, LimiterStatus};
pub use window::{GlobalWindow, InvalidRequestCounter};

pub use tokio_util::sync::CancellationToken;
