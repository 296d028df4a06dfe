//! DeliveryUnit - one outbound webhook call
//!
//! A record decomposes into an ordered list of units; each unit is an
//! independent network request.

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Maximum embed description length accepted downstream.
pub const MAX_DESCRIPTION_CHARS: usize = 4096;

/// Author block shown on every unit; doubles as the webhook username/avatar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub icon: Option<String>,
    pub link: Option<String>,
}

/// Downloaded media file attached to a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Upload filename, referenced as `attachment://<filename>`
    pub filename: String,
    /// MIME type of the upload part (`image/*`, `video/*`)
    pub content_type: String,
    pub bytes: Bytes,
}

impl Attachment {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Rich embed message.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedUnit {
    pub title: String,
    /// Title link (the record permalink)
    pub link: String,
    /// Accent colour, `0xRRGGBB`
    pub color: u32,
    pub author: Author,
    pub description: Option<String>,
    /// Image shown inside the embed
    pub image: Option<Attachment>,
    /// Video uploaded next to the embed
    pub video: Option<Attachment>,
    pub footer: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl EmbedUnit {
    /// Set the description, truncated to [`MAX_DESCRIPTION_CHARS`].
    ///
    /// Empty text clears the description.
    pub fn set_description(&mut self, text: &str) {
        self.description = if text.is_empty() {
            None
        } else {
            Some(truncate_chars(text, MAX_DESCRIPTION_CHARS))
        };
    }
}

/// Plain message content (used for video links).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainLinkUnit {
    pub content: String,
    pub author: Author,
}

/// Closed set of outbound payload shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryUnit {
    Embed(EmbedUnit),
    PlainLink(PlainLinkUnit),
}

impl DeliveryUnit {
    /// Metric label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Embed(_) => "embed",
            Self::PlainLink(_) => "link",
        }
    }

    pub fn author(&self) -> &Author {
        match self {
            Self::Embed(embed) => &embed.author,
            Self::PlainLink(link) => &link.author,
        }
    }

    /// Files uploaded with this unit, image first.
    pub fn attachments(&self) -> Vec<&Attachment> {
        match self {
            Self::Embed(embed) => embed.image.iter().chain(embed.video.iter()).collect(),
            Self::PlainLink(_) => Vec::new(),
        }
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments().is_empty()
    }
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
