//! Global admission window and invalid request counter.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Rolling admission window shared by every bucket.
///
/// Keeps the admission instants of the last `limit` requests, so no span of
/// `window` length ever contains more than `limit` admissions.
#[derive(Debug)]
pub struct GlobalWindow {
    limit: u32,
    window: Duration,
    admitted: VecDeque<Instant>,
    suspended_until: Option<Instant>,
}

impl GlobalWindow {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            admitted: VecDeque::with_capacity(limit as usize),
            suspended_until: None,
        }
    }

    /// Time to wait before a request could be admitted, `None` if it can go now.
    ///
    /// Does not record anything.
    pub fn wait_time(&mut self, now: Instant) -> Option<Duration> {
        if let Some(until) = self.suspended_until {
            if now < until {
                return Some(until - now);
            }
            self.suspended_until = None;
        }

        self.evict(now);
        if self.admitted.len() < self.limit as usize {
            return None;
        }
        self.admitted
            .front()
            .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
    }

    /// Record an admission at `now`. Callers check [`wait_time`](Self::wait_time) first.
    pub fn admit(&mut self, now: Instant) {
        self.admitted.push_back(now);
    }

    /// Block every bucket until `until` (global 429).
    pub fn suspend_until(&mut self, until: Instant) {
        self.suspended_until = Some(self.suspended_until.map_or(until, |cur| cur.max(until)));
    }

    /// Admissions inside the window ending at `now`
    pub fn in_window(&mut self, now: Instant) -> u32 {
        self.evict(now);
        self.admitted.len() as u32
    }

    /// Time until the oldest admission leaves the window
    pub fn window_remaining(&self, now: Instant) -> Duration {
        self.admitted
            .front()
            .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
            .unwrap_or_default()
    }

    pub fn suspended_for(&self, now: Instant) -> Option<Duration> {
        self.suspended_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn evict(&mut self, now: Instant) {
        while let Some(oldest) = self.admitted.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Fixed-window counter of 401/403/429 answers.
///
/// A soft signal: exceeding it never blocks requests. The count resets
/// wholesale once `window` has elapsed; unlike [`GlobalWindow`] no
/// per-answer log is kept.
#[derive(Debug)]
pub struct InvalidRequestCounter {
    limit: u32,
    window: Duration,
    count: u32,
    window_start: Instant,
}

impl InvalidRequestCounter {
    pub fn new(limit: u32, window: Duration, now: Instant) -> Self {
        Self {
            limit,
            window,
            count: 0,
            window_start: now,
        }
    }

    /// Count one invalid response, returning the count in the current window.
    pub fn record(&mut self, now: Instant) -> u32 {
        self.roll(now);
        self.count += 1;
        self.count
    }

    /// Whether the count is above 80% of the limit
    pub fn is_near_limit(&self) -> bool {
        u64::from(self.count) * 10 > u64::from(self.limit) * 8
    }

    pub fn count(&mut self, now: Instant) -> u32 {
        self.roll(now);
        self.count
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window_remaining(&self, now: Instant) -> Duration {
        (self.window_start + self.window).saturating_duration_since(now)
    }

    fn roll(&mut self, now: Instant) {
        if now.saturating_duration_since(self.window_start) >= self.window {
            self.count = 0;
            self.window_start = now;
        }
    }
}
