//! Time source used by the limiter.
//!
//! All waits go through [`Clock::sleep_until`] so tests can run on tokio's
//! paused clock and production code stays cancellable.

use std::future::Future;
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

/// Boxed sleep future returned by [`Clock::sleep_until`].
pub type Sleep = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Monotonic time, wall time and sleeping.
pub trait Clock: Send + Sync {
    /// Monotonic now
    fn now(&self) -> Instant;

    /// Seconds since the unix epoch, used to resolve absolute reset headers
    fn unix_now(&self) -> f64;

    /// Future that completes at `deadline`
    fn sleep_until(&self, deadline: Instant) -> Sleep;
}

/// Tokio-backed clock. Honors `tokio::time::pause()` in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    fn sleep_until(&self, deadline: Instant) -> Sleep {
        Box::pin(tokio::time::sleep_until(deadline))
    }
}
