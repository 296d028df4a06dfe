//! MessageRecord - feed reader output
//!
//! One published item of a source, already rendered to Markdown text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SourceId;

/// Feed record.
///
/// Immutable once produced by the feed reader. `image`/`video` are the
/// primary media, `images`/`videos` the full ordered lists (the primary
/// item is the first element of each list when present).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Owning channel
    pub source_id: SourceId,

    /// Sequence number parsed from the permalink
    pub sequence: u64,

    /// Author display name
    pub author_name: String,

    /// Author avatar url
    #[serde(default)]
    pub author_icon: Option<String>,

    /// Markdown body (may be empty)
    #[serde(default)]
    pub text: String,

    /// Primary image url
    #[serde(default)]
    pub image: Option<String>,

    /// Primary video url
    #[serde(default)]
    pub video: Option<String>,

    /// All image urls, in feed order
    #[serde(default)]
    pub images: Vec<String>,

    /// All video urls, in feed order
    #[serde(default)]
    pub videos: Vec<String>,

    /// Publish timestamp
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,

    /// Permalink (`https://t.me/<channel>/<sequence>`)
    pub permalink: String,
}

impl MessageRecord {
    /// Bare record with a derived permalink; used by tests and placeholders.
    pub fn new(source_id: SourceId, sequence: u64) -> Self {
        let permalink = source_id.permalink(sequence);
        Self {
            author_name: source_id.to_string(),
            source_id,
            sequence,
            permalink,
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the image list; the first url becomes the primary image.
    pub fn with_images<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.images = urls.into_iter().map(Into::into).collect();
        self.image = self.images.first().cloned();
        self
    }

    /// Set the video list; the first url becomes the primary video.
    pub fn with_videos<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.videos = urls.into_iter().map(Into::into).collect();
        self.video = self.videos.first().cloned();
        self
    }

    /// Combined image + video count.
    ///
    /// Falls back to the primary fields when the lists are empty.
    pub fn media_count(&self) -> usize {
        let images = self.images.len().max(usize::from(self.image.is_some()));
        let videos = self.videos.len().max(usize::from(self.video.is_some()));
        images + videos
    }

    /// Whether delivery needs the grouped path (more than one image or
    /// more than one video).
    pub fn is_grouped(&self) -> bool {
        self.images.len() > 1 || self.videos.len() > 1
    }

    /// Permalink of another record of the same source.
    pub fn permalink_for(&self, sequence: u64) -> String {
        self.source_id.permalink(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_count_combines_lists() {
        let record = MessageRecord::new("chan".into(), 50)
            .with_images(["a.jpg", "b.jpg", "c.jpg"])
            .with_videos(["v.mp4"]);
        assert_eq!(record.media_count(), 4);
        assert!(record.is_grouped());
        assert_eq!(record.image.as_deref(), Some("a.jpg"));
    }

    #[test]
    fn test_media_count_primary_only() {
        let mut record = MessageRecord::new("chan".into(), 1);
        record.image = Some("a.jpg".into());
        assert_eq!(record.media_count(), 1);
        assert!(!record.is_grouped());
    }

    #[test]
    fn test_one_image_one_video_is_not_grouped() {
        let record = MessageRecord::new("chan".into(), 1)
            .with_images(["a.jpg"])
            .with_videos(["v.mp4"]);
        assert_eq!(record.media_count(), 2);
        assert!(!record.is_grouped());
    }

    #[test]
    fn test_permalinks() {
        let record = MessageRecord::new("chan".into(), 10);
        assert_eq!(record.permalink, "https://t.me/chan/10");
        assert_eq!(record.permalink_for(11), "https://t.me/chan/11");
    }
}
