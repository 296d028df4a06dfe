//! MediaFetcher trait - media download interface

use std::fmt;

use crate::{Attachment, ContractError};

/// Media category; decides timeout, filename and upload MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Image => "image/*",
            Self::Video => "video/*",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// Downloads media referenced by a record.
#[trait_variant::make(MediaFetcher: Send)]
pub trait LocalMediaFetcher {
    /// Download `url` into an attachment.
    ///
    /// # Errors
    /// Returns a media error once the implementation gave up retrying
    async fn fetch(&self, url: &str, kind: MediaKind) -> Result<Attachment, ContractError>;
}
