//! Channel preview page parsing

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use contracts::{MessageRecord, SourceId};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::markdown::render_markdown;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static MESSAGE_WRAP: LazyLock<Selector> =
    LazyLock::new(|| selector("div.tgme_widget_message_wrap"));
static MESSAGE_LINK: LazyLock<Selector> =
    LazyLock::new(|| selector("a.tgme_widget_message_date[href]"));
static OWNER_NAME: LazyLock<Selector> =
    LazyLock::new(|| selector("a.tgme_widget_message_owner_name"));
static USER_PHOTO: LazyLock<Selector> =
    LazyLock::new(|| selector("i.tgme_widget_message_user_photo img[src]"));
static MESSAGE_TEXT: LazyLock<Selector> =
    LazyLock::new(|| selector("div.tgme_widget_message_text.js-message_text"));
static ANY_MESSAGE_TEXT: LazyLock<Selector> =
    LazyLock::new(|| selector("div.tgme_widget_message_text"));
static PHOTO_WRAP: LazyLock<Selector> =
    LazyLock::new(|| selector("a.tgme_widget_message_photo_wrap[style]"));
static VIDEO: LazyLock<Selector> =
    LazyLock::new(|| selector("video.tgme_widget_message_video[src]"));
static TIME: LazyLock<Selector> = LazyLock::new(|| selector("time[datetime]"));
static OG_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[property="og:description"][content]"#));

static BACKGROUND_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)background-image:\s*url\('([^']+?\.(?:jpg|jpeg|png|webp))'\)")
        .expect("static regex")
});

/// Page descriptions Telegram serves for channels rather than messages
static CHANNEL_BLURBS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^the official .+ on telegram",
        r"^official .+ channel",
        r"^.+ official channel",
        r"^welcome to .+",
        r"^much recursion\. very telegram\. wow\.",
        r"^.+\s+–\s+.+$",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("static regex"))
    .collect()
});

/// Parse a channel preview page into records, in page order.
///
/// Messages without a permalink of `source` (forwards, service posts,
/// malformed markup) are skipped.
pub fn parse_page(html: &str, source: &SourceId) -> Vec<MessageRecord> {
    let document = Html::parse_document(html);
    document
        .select(&MESSAGE_WRAP)
        .filter_map(|wrap| parse_message(wrap, source))
        .collect()
}

fn parse_message(wrap: ElementRef<'_>, source: &SourceId) -> Option<MessageRecord> {
    let permalink = wrap
        .select(&MESSAGE_LINK)
        .next()
        .and_then(|link| link.value().attr("href"))?;
    let Some(sequence) = parse_sequence(permalink, source) else {
        debug!(source = %source, permalink, "skipping message with foreign permalink");
        return None;
    };

    let author_name = wrap
        .select(&OWNER_NAME)
        .next()
        .map(|owner| owner.text().collect::<String>().trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| source.to_string());

    let author_icon = wrap
        .select(&USER_PHOTO)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string);

    let text = wrap
        .select(&MESSAGE_TEXT)
        .next()
        .map(render_markdown)
        .unwrap_or_default();

    let images = wrap
        .select(&PHOTO_WRAP)
        .filter_map(|photo| photo.value().attr("style"))
        .filter_map(extract_image_url);

    let videos = wrap
        .select(&VIDEO)
        .filter_map(|video| video.value().attr("src"))
        .map(str::to_string);

    let published_at = wrap
        .select(&TIME)
        .next()
        .and_then(|time| time.value().attr("datetime"))
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|time| time.with_timezone(&Utc));

    let mut record = MessageRecord::new(source.clone(), sequence)
        .with_text(text)
        .with_images(images)
        .with_videos(videos);
    record.author_name = author_name;
    record.author_icon = author_icon;
    record.published_at = published_at;
    record.permalink = permalink.to_string();
    Some(record)
}

/// Sequence number of a `https://t.me/<channel>/<n>` permalink.
///
/// The channel comparison ignores ASCII case; Telegram links use the
/// channel's display casing.
pub fn parse_sequence(permalink: &str, source: &SourceId) -> Option<u64> {
    let path = permalink
        .strip_prefix("https://t.me/")
        .or_else(|| permalink.strip_prefix("http://t.me/"))?;
    let path = path.split(['?', '#']).next()?;
    let (channel, sequence) = path.split_once('/')?;
    if !channel.eq_ignore_ascii_case(source.as_str()) {
        return None;
    }
    sequence.parse().ok()
}

/// Image url from a photo wrapper's inline `background-image` style
pub fn extract_image_url(style: &str) -> Option<String> {
    BACKGROUND_IMAGE
        .captures(style)
        .and_then(|caps| caps.get(1))
        .map(|url| url.as_str().to_string())
}

/// Body text of a single-message page.
///
/// Prefers the rendered message div; falls back to the `og:description`
/// meta tag when it looks like message content rather than a channel blurb.
pub fn parse_individual_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    if let Some(text) = document
        .select(&ANY_MESSAGE_TEXT)
        .next()
        .map(render_markdown)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
    {
        return Some(text);
    }

    document
        .select(&OG_DESCRIPTION)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(str::trim)
        .filter(|content| is_likely_message_content(content))
        .map(str::to_string)
}

/// Whether an `og:description` value is real message text.
///
/// Rejects empty or single-word values and the generic channel
/// descriptions Telegram substitutes when a message has no text.
pub fn is_likely_message_content(content: &str) -> bool {
    let content = content.trim();
    if content.split_whitespace().count() <= 1 {
        return false;
    }
    let lowered = content.to_lowercase();
    !CHANNEL_BLURBS.iter().any(|blurb| blurb.is_match(&lowered))
}
