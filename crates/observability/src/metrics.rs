//! Relay metric helpers
//!
//! Thin wrappers over the `metrics` macros so metric names and labels stay
//! consistent across crates. Without an installed recorder they are no-ops.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};

/// Attach help text to every relay metric. Called once the exporter is up.
pub fn describe_relay_metrics() {
    describe_counter!("relay_units_sent_total", "Units accepted by the webhook");
    describe_counter!(
        "relay_units_failed_total",
        "Units abandoned after permanent failure or exhausted retries"
    );
    describe_counter!("relay_records_total", "Records processed, by outcome");
    describe_counter!("relay_placeholders_total", "Placeholders posted for sequence gaps");
    describe_histogram!(
        "relay_ratelimit_wait_ms",
        Unit::Milliseconds,
        "Time spent waiting for rate-limit capacity"
    );
    describe_counter!("relay_http_responses_total", "Webhook responses by status class");
    describe_gauge!("relay_invalid_requests_current", "Invalid responses in the rolling window");
    describe_counter!("relay_feed_fetch_total", "Feed fetch attempts by result");
    describe_gauge!("relay_last_processed_sequence", "Highest sequence processed per source");
}

/// One unit accepted downstream
pub fn record_unit_sent(source: &str, kind: &'static str) {
    counter!(
        "relay_units_sent_total",
        "source" => source.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// One unit abandoned (permanent failure or retries exhausted)
pub fn record_unit_failed(source: &str, reason: &'static str) {
    counter!(
        "relay_units_failed_total",
        "source" => source.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Record-level outcome (`delivered`, `partial`, `failed`, `skipped`, `grouped`)
pub fn record_record_outcome(source: &str, outcome: &'static str) {
    counter!(
        "relay_records_total",
        "source" => source.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Placeholder emitted for a gap
pub fn record_placeholder(source: &str) {
    counter!("relay_placeholders_total", "source" => source.to_string()).increment(1);
}

/// Time spent waiting for capacity, by scope (`global`, `bucket`, `backoff`)
pub fn record_ratelimit_wait_ms(scope: &'static str, wait_ms: f64) {
    histogram!("relay_ratelimit_wait_ms", "scope" => scope).record(wait_ms);
}

/// Downstream response, labelled by status class (`2xx`, `4xx`, `429`, `5xx`, `network`)
pub fn record_http_response(status: Option<u16>) {
    let class = match status {
        None => "network",
        Some(429) => "429",
        Some(s) if s < 300 => "2xx",
        Some(s) if s < 400 => "3xx",
        Some(s) if s < 500 => "4xx",
        Some(_) => "5xx",
    };
    counter!("relay_http_responses_total", "class" => class).increment(1);
}

/// Current invalid-request count in the rolling window
pub fn record_invalid_requests(count: u32) {
    gauge!("relay_invalid_requests_current").set(f64::from(count));
}

/// Feed fetch result
pub fn record_feed_fetch(source: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "relay_feed_fetch_total",
        "source" => source.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Cursor position of a source
pub fn record_last_processed(source: &str, sequence: u64) {
    gauge!("relay_last_processed_sequence", "source" => source.to_string()).set(sequence as f64);
}
