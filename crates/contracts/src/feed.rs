//! FeedSource trait - feed reader interface

use crate::{ContractError, MessageRecord, SourceId};

/// Produces the latest records of a source.
#[trait_variant::make(FeedSource: Send)]
pub trait LocalFeedSource {
    /// Fetch the records currently visible for `source`, oldest first.
    ///
    /// May return an empty list. Failures are transient from the caller's
    /// point of view: the ingestion loop logs them and retries next cycle.
    async fn fetch(&self, source: &SourceId) -> Result<Vec<MessageRecord>, ContractError>;
}
