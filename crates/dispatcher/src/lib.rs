//! # Dispatcher
//!
//! Delivery of feed records to the downstream webhook.
//!
//! Responsibilities:
//! - Decompose a `MessageRecord` into ordered `DeliveryUnit`s
//! - Download media and attach it to units
//! - Drive every unit through the shared `RateLimiter`
//! - Report per-record outcomes for the ledger

pub mod error;
pub mod media;
pub mod metrics;
pub mod mock;
pub mod payload;
pub mod pipeline;
pub mod sinks;
pub mod units;

pub use contracts::{DeliveryUnit, MessageRecord, WebhookSink};
pub use error::DispatchError;
pub use media::{HttpMediaFetcher, MediaOptions};
pub use metrics::{DeliveryMetrics, MetricsSnapshot};
pub use mock::{RecordingSink, ScriptedMediaFetcher};
pub use pipeline::{DeliveryPipeline, RecordOutcome};
pub use sinks::{DiscordWebhookSink, LogSink};
pub use units::UnitPlanner;
