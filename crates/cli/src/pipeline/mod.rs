//! Relay orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{Relay, RelaySettings};
pub use stats::{RunStats, SourceStats};
