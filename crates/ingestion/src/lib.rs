//! # Ingestion
//!
//! Per-source polling: feed continuity tracking and the fetch/process loop.
//!
//! Responsibilities:
//! - Track the last processed sequence and grouped-media components
//! - Detect gaps and request placeholders for them
//! - Hand new records to the delivery pipeline, persist progress to the ledger
//! - Survive fetch and delivery failures; stop only on startup errors or shutdown
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::IngestionLoop;
//!
//! let mut ingest = IngestionLoop::new(feed, pipeline, ledger, poll_interval)?;
//! let report = ingest.run(&shutdown, &abort).await;
//! println!("delivered {}", report.delivered);
//! ```
//!
//! ## Scripted Feed
//!
//! ```ignore
//! use ingestion::ScriptedFeed;
//!
//! let feed = ScriptedFeed::with_page(records);
//! feed.push_error("upstream down");
//! ```

mod error;
mod ingestion_loop;
mod mock;
mod sequence;

// Re-exports
pub use error::{IngestionError, Result};
pub use ingestion_loop::{CycleReport, IngestionLoop};
pub use mock::ScriptedFeed;
pub use sequence::{Action, Observation, SequenceTracker};
