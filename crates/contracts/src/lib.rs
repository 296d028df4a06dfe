//! # Contracts
//!
//! Frozen interface contracts shared by every relay crate: the feed record
//! model, delivery units, endpoint keys and the collaborator traits
//! (feed source, ledger, webhook sink, media fetcher).
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Sequence Model
//! - Every record carries a per-source `sequence` parsed from its permalink
//! - Sequences are monotonically increasing within a source, but may have gaps

mod config;
mod endpoint;
mod error;
mod feed;
mod ledger;
mod media;
mod record;
mod sink;
mod source_id;
mod unit;

pub use config::*;
pub use endpoint::EndpointKey;
pub use error::*;
pub use feed::{FeedSource, LocalFeedSource};
pub use ledger::Ledger;
pub use media::{LocalMediaFetcher, MediaFetcher, MediaKind};
pub use record::*;
pub use sink::*;
pub use source_id::SourceId;
pub use unit::*;
