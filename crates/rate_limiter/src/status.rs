//! Point-in-time limiter snapshot for logs and `info` output.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Snapshot returned by [`RateLimiter::status`](crate::RateLimiter::status)
#[derive(Debug, Clone, Default, Serialize)]
pub struct LimiterStatus {
    pub global: GlobalStatus,
    pub buckets: BTreeMap<String, BucketStatus>,
    pub invalid_requests: InvalidRequestStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GlobalStatus {
    /// Admissions inside the current window
    pub requests_in_window: u32,
    pub limit: u32,
    /// Seconds until the oldest admission leaves the window
    pub window_remaining_secs: f64,
    /// Seconds left on a global 429 suspension
    pub suspended_secs: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BucketStatus {
    pub bucket_id: Option<String>,
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_after_secs: f64,
    pub suspended_secs: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InvalidRequestStatus {
    pub count: u32,
    pub limit: u32,
    pub window_remaining_secs: f64,
}

impl fmt::Display for LimiterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Rate Limiter Status ===")?;
        write!(
            f,
            "Global: {}/{} in window ({:.2}s left)",
            self.global.requests_in_window, self.global.limit, self.global.window_remaining_secs
        )?;
        if let Some(secs) = self.global.suspended_secs {
            write!(f, ", suspended {secs:.2}s")?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "Invalid requests: {}/{} ({:.0}s left in window)",
            self.invalid_requests.count,
            self.invalid_requests.limit,
            self.invalid_requests.window_remaining_secs
        )?;
        for (key, bucket) in &self.buckets {
            let limit = bucket.limit.map_or("?".to_string(), |v| v.to_string());
            let remaining = bucket.remaining.map_or("?".to_string(), |v| v.to_string());
            write!(
                f,
                "  {key}: {remaining}/{limit} remaining, reset in {:.2}s",
                bucket.reset_after_secs
            )?;
            if let Some(secs) = bucket.suspended_secs {
                write!(f, ", suspended {secs:.2}s")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
