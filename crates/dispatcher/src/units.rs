//! Record to DeliveryUnit planning

use contracts::{
    truncate_chars, Attachment, Author, DeliveryUnit, EmbedUnit, MessageRecord, PlainLinkUnit,
    MAX_DESCRIPTION_CHARS,
};

pub const LINK_TITLE: &str = "Message Link";
pub const GROUPED_TITLE: &str = "Grouped Media Message";

/// Builds the units of a record.
///
/// Pure: media is downloaded by the pipeline and handed in as attachments.
#[derive(Debug, Clone)]
pub struct UnitPlanner {
    color: u32,
    placeholder_text: String,
}

impl UnitPlanner {
    pub fn new(color: u32, placeholder_text: impl Into<String>) -> Self {
        Self {
            color,
            placeholder_text: placeholder_text.into(),
        }
    }

    pub fn color(&self) -> u32 {
        self.color
    }

    pub fn author(&self, record: &MessageRecord) -> Author {
        Author {
            name: record.author_name.clone(),
            icon: record.author_icon.clone(),
            link: Some(record.permalink.clone()),
        }
    }

    fn embed(&self, record: &MessageRecord, title: &str, link: &str) -> EmbedUnit {
        EmbedUnit {
            title: title.to_string(),
            link: link.to_string(),
            color: self.color,
            author: Author {
                link: Some(link.to_string()),
                ..self.author(record)
            },
            description: None,
            image: None,
            video: None,
            footer: None,
            timestamp: record.published_at,
        }
    }

    /// Single-media unit: text plus the optional image and video files.
    pub fn single(
        &self,
        record: &MessageRecord,
        image: Option<Attachment>,
        video: Option<Attachment>,
    ) -> DeliveryUnit {
        let mut unit = self.embed(record, LINK_TITLE, &record.permalink);
        unit.set_description(&record.text);
        unit.image = image;
        unit.video = video;
        DeliveryUnit::Embed(unit)
    }

    /// Link to a single-path video that could not be attached.
    pub fn single_video_link(&self, record: &MessageRecord, video_url: &str) -> DeliveryUnit {
        DeliveryUnit::PlainLink(PlainLinkUnit {
            content: format!(
                "[Attached video]({video_url})\n[Message Link](<{}>)",
                record.permalink
            ),
            author: self.author(record),
        })
    }

    /// First unit of a grouped record, annotated with the media counts.
    pub fn grouped_main(&self, record: &MessageRecord, image: Option<Attachment>) -> DeliveryUnit {
        let mut unit = self.embed(record, GROUPED_TITLE, &record.permalink);
        let summary = format!(
            "📁 **Grouped Media:** {} images, {} videos",
            record.images.len(),
            record.videos.len()
        );
        let description = if record.text.is_empty() {
            summary
        } else {
            // keep the summary visible when the text is near the limit
            let room = MAX_DESCRIPTION_CHARS.saturating_sub(summary.chars().count() + 2);
            format!("{}\n\n{summary}", truncate_chars(&record.text, room))
        };
        unit.set_description(&description);
        unit.image = image;
        DeliveryUnit::Embed(unit)
    }

    /// Extra image `index` (1-based) of `total`.
    pub fn grouped_image(
        &self,
        record: &MessageRecord,
        index: usize,
        total: usize,
        image: Attachment,
    ) -> DeliveryUnit {
        let mut unit = self.embed(record, LINK_TITLE, &record.permalink);
        unit.set_description(&record.text);
        unit.image = Some(image);
        unit.footer = Some(format!("Image {index} of {total}"));
        DeliveryUnit::Embed(unit)
    }

    /// Video `index` (1-based) of `total`, uploaded as a file.
    pub fn grouped_video(
        &self,
        record: &MessageRecord,
        index: usize,
        total: usize,
        video: Attachment,
    ) -> DeliveryUnit {
        let mut unit = self.embed(record, LINK_TITLE, &record.permalink);
        unit.set_description(&record.text);
        unit.video = Some(video);
        unit.footer = Some(format!("Video {index} of {total}"));
        DeliveryUnit::Embed(unit)
    }

    /// Link fallback for video `index` (1-based) of `total`.
    pub fn grouped_video_link(
        &self,
        record: &MessageRecord,
        index: usize,
        total: usize,
        video_url: &str,
    ) -> DeliveryUnit {
        DeliveryUnit::PlainLink(PlainLinkUnit {
            content: format!(
                "🎥 **Video** [**{index}**]({video_url}) of {total}\n[Message Link](<{}>)",
                record.permalink
            ),
            author: self.author(record),
        })
    }

    /// Fixed-text unit standing in for the unrecoverable record `gap`.
    ///
    /// Borrows author and timestamp from `record`, the record that exposed
    /// the gap.
    pub fn placeholder(&self, record: &MessageRecord, gap: u64) -> DeliveryUnit {
        let link = record.permalink_for(gap);
        let mut unit = self.embed(record, LINK_TITLE, &link);
        unit.set_description(&self.placeholder_text);
        DeliveryUnit::Embed(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::DEFAULT_PLACEHOLDER_TEXT;

    fn planner() -> UnitPlanner {
        UnitPlanner::new(0x89a7d9, DEFAULT_PLACEHOLDER_TEXT)
    }

    fn record() -> MessageRecord {
        let mut record = MessageRecord::new("chan".into(), 50).with_text("hello");
        record.author_name = "Channel".into();
        record.author_icon = Some("https://cdn/icon.jpg".into());
        record
    }

    fn embed(unit: DeliveryUnit) -> EmbedUnit {
        match unit {
            DeliveryUnit::Embed(embed) => embed,
            DeliveryUnit::PlainLink(link) => panic!("expected embed, got {link:?}"),
        }
    }

    #[test]
    fn test_single_unit() {
        let image = Attachment::new("img_1_1.jpg", "image/*", vec![1u8, 2, 3]);
        let unit = embed(planner().single(&record(), Some(image.clone()), None));
        assert_eq!(unit.title, LINK_TITLE);
        assert_eq!(unit.link, "https://t.me/chan/50");
        assert_eq!(unit.color, 0x89a7d9);
        assert_eq!(unit.author.name, "Channel");
        assert_eq!(unit.author.link.as_deref(), Some("https://t.me/chan/50"));
        assert_eq!(unit.description.as_deref(), Some("hello"));
        assert_eq!(unit.image, Some(image));
        assert!(unit.footer.is_none());
    }

    #[test]
    fn test_single_without_text_has_no_description() {
        let record = MessageRecord::new("chan".into(), 1);
        let unit = embed(planner().single(&record, None, None));
        assert!(unit.description.is_none());
    }

    #[test]
    fn test_grouped_main_annotation() {
        let record = record()
            .with_images(["a.jpg", "b.jpg", "c.jpg"])
            .with_videos(["v.mp4"]);
        let unit = embed(planner().grouped_main(&record, None));
        assert_eq!(unit.title, GROUPED_TITLE);
        assert_eq!(
            unit.description.as_deref(),
            Some("hello\n\n📁 **Grouped Media:** 3 images, 1 videos")
        );
    }

    #[test]
    fn test_grouped_main_long_text_keeps_summary() {
        let record = MessageRecord::new("chan".into(), 1)
            .with_text("x".repeat(5000))
            .with_images(["a.jpg", "b.jpg"]);
        let unit = embed(planner().grouped_main(&record, None));
        let description = unit.description.unwrap();
        assert_eq!(description.chars().count(), MAX_DESCRIPTION_CHARS);
        assert!(description.ends_with("2 images, 0 videos"));
    }

    #[test]
    fn test_grouped_footers() {
        let file = Attachment::new("f", "image/*", vec![0u8]);
        let image = embed(planner().grouped_image(&record(), 2, 3, file.clone()));
        assert_eq!(image.footer.as_deref(), Some("Image 2 of 3"));
        assert_eq!(image.title, LINK_TITLE);

        let video = embed(planner().grouped_video(&record(), 1, 2, file));
        assert_eq!(video.footer.as_deref(), Some("Video 1 of 2"));
        assert!(video.image.is_none());
        assert!(video.video.is_some());
    }

    #[test]
    fn test_video_link_content() {
        let single = planner().single_video_link(&record(), "https://cdn/v.mp4");
        let DeliveryUnit::PlainLink(link) = single else {
            panic!("expected plain link");
        };
        assert_eq!(
            link.content,
            "[Attached video](https://cdn/v.mp4)\n[Message Link](<https://t.me/chan/50>)"
        );

        let grouped = planner().grouped_video_link(&record(), 2, 3, "https://cdn/v.mp4");
        let DeliveryUnit::PlainLink(link) = grouped else {
            panic!("expected plain link");
        };
        assert_eq!(
            link.content,
            "🎥 **Video** [**2**](https://cdn/v.mp4) of 3\n[Message Link](<https://t.me/chan/50>)"
        );
    }

    #[test]
    fn test_placeholder_uses_gap_permalink() {
        let mut trigger = record();
        trigger.sequence = 103;
        let unit = embed(planner().placeholder(&trigger, 101));
        assert_eq!(unit.link, "https://t.me/chan/101");
        assert_eq!(unit.author.link.as_deref(), Some("https://t.me/chan/101"));
        assert_eq!(unit.author.name, "Channel");
        assert_eq!(unit.description.as_deref(), Some(DEFAULT_PLACEHOLDER_TEXT));
        assert!(!DeliveryUnit::Embed(unit).has_attachments());
    }
}
