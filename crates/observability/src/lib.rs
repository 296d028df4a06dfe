//! # Observability
//!
//! Log subscriber and Prometheus exporter for the relay.
//!
//! Logging is installed once by the binary; the exporter is optional and
//! only started by `relay run`. The `record_*` helpers are safe to call
//! before (or without) an installed recorder.
//!
//! ```ignore
//! use observability::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default())?;
//! observability::record_unit_sent("durov", "embed");
//! ```

pub mod metrics;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    describe_relay_metrics, record_feed_fetch, record_http_response, record_invalid_requests,
    record_last_processed, record_placeholder, record_ratelimit_wait_ms, record_record_outcome,
    record_unit_failed, record_unit_sent,
};

/// Output shape of the log subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Multi-line, human oriented
    Pretty,
    /// Single line per event
    Compact,
}

/// Log subscriber settings
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Directive used when `RUST_LOG` is absent (or ignored)
    pub level: String,
    /// Ignore `RUST_LOG`; used by `--quiet`
    pub ignore_env: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
            ignore_env: false,
        }
    }
}

impl LogConfig {
    fn filter(&self) -> EnvFilter {
        if self.ignore_env {
            return EnvFilter::new(&self.level);
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

/// Install the global tracing subscriber. Fails if one is already set.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    // JSON lines carry source locations; interactive formats stay short
    let layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_target(false).boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(config.filter())
        .with(layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    tracing::debug!(format = ?config.format, level = %config.level, "Logging ready");
    Ok(())
}

/// Start the Prometheus scrape endpoint on `port` (all interfaces) and
/// register descriptions for every `relay_*` metric.
pub fn init_metrics(port: u16) -> Result<SocketAddr> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("Failed to start metrics endpoint on {addr}"))?;

    describe_relay_metrics();
    tracing::info!(%addr, "Metrics endpoint listening");
    Ok(addr)
}
