//! HttpMediaFetcher - downloads record media for upload

use std::time::Duration;

use contracts::{Attachment, ContractError, DeliveryConfig, MediaFetcher, MediaKind};
use tracing::{debug, instrument, warn};

use crate::error::DispatchError;

const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mov", "avi", "webm", "mkv"];

/// Download attempts and timeouts
#[derive(Debug, Clone)]
pub struct MediaOptions {
    pub attempts: u32,
    /// First delay between attempts, doubled each retry
    pub retry_delay: Duration,
    pub image_timeout: Duration,
    pub video_timeout: Duration,
}

impl Default for MediaOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay: Duration::from_secs(2),
            image_timeout: Duration::from_secs(10),
            video_timeout: Duration::from_secs(30),
        }
    }
}

impl MediaOptions {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            attempts: config.media_attempts.max(1),
            image_timeout: Duration::from_secs(config.media_timeout_secs),
            video_timeout: Duration::from_secs(config.video_timeout_secs),
            ..Self::default()
        }
    }

    fn timeout(&self, kind: MediaKind) -> Duration {
        match kind {
            MediaKind::Image => self.image_timeout,
            MediaKind::Video => self.video_timeout,
        }
    }
}

/// Media fetcher over HTTP
pub struct HttpMediaFetcher {
    client: reqwest::Client,
    options: MediaOptions,
}

impl HttpMediaFetcher {
    pub fn new(options: MediaOptions) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| DispatchError::sink_creation("media", e.to_string()))?;
        Ok(Self { client, options })
    }

    async fn fetch_once(&self, url: &str, kind: MediaKind) -> Result<bytes::Bytes, ContractError> {
        let resp = self
            .client
            .get(url)
            .timeout(self.options.timeout(kind))
            .send()
            .await
            .map_err(|e| ContractError::media(url, e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ContractError::media(url, format!("status {}", status.as_u16())));
        }
        resp.bytes()
            .await
            .map_err(|e| ContractError::media(url, e.to_string()))
    }
}

impl MediaFetcher for HttpMediaFetcher {
    #[instrument(name = "media_fetch", skip(self), fields(kind = %kind))]
    async fn fetch(&self, url: &str, kind: MediaKind) -> Result<Attachment, ContractError> {
        let attempts = self.options.attempts.max(1);
        let mut delay = self.options.retry_delay;

        for attempt in 1..=attempts {
            match self.fetch_once(url, kind).await {
                Ok(bytes) => {
                    let unix = chrono::Utc::now().timestamp();
                    let filename = media_filename(kind, url, unix, attempt);
                    debug!(%filename, size = bytes.len(), "Downloaded media");
                    return Ok(Attachment::new(filename, kind.content_type(), bytes));
                }
                Err(err) if attempt < attempts => {
                    warn!(attempt, error = %err, "Download failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => {
                    warn!(attempts, error = %err, "Download failed");
                    return Err(err);
                }
            }
        }

        Err(ContractError::media(url, "no download attempts"))
    }
}

/// Upload filename for a download.
///
/// Images keep the url's extension (default `.jpg`): `img_<unix>_<attempt>.<ext>`.
/// Videos are limited to known containers (default `mp4`):
/// `video_<unix>_<attempt>.<ext>`.
pub fn media_filename(kind: MediaKind, url: &str, unix: i64, attempt: u32) -> String {
    let ext = url_extension(url);
    match kind {
        MediaKind::Image => {
            let ext = ext.unwrap_or_else(|| "jpg".to_string());
            format!("img_{unix}_{attempt}.{ext}")
        }
        MediaKind::Video => {
            let ext = ext
                .filter(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
                .unwrap_or_else(|| "mp4".to_string());
            format!("video_{unix}_{attempt}.{ext}")
        }
    }
}

/// Lower-cased extension of the url's last path segment
fn url_extension(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.last()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_filenames() {
        assert_eq!(
            media_filename(MediaKind::Image, "https://cdn.example/a/photo.PNG?x=1", 100, 1),
            "img_100_1.png"
        );
        assert_eq!(
            media_filename(MediaKind::Image, "https://cdn.example/a/photo", 100, 2),
            "img_100_2.jpg"
        );
    }

    #[test]
    fn test_video_filenames() {
        assert_eq!(
            media_filename(MediaKind::Video, "https://cdn.example/v/clip.webm", 7, 1),
            "video_7_1.webm"
        );
        assert_eq!(
            media_filename(MediaKind::Video, "https://cdn.example/v/clip.gif", 7, 3),
            "video_7_3.mp4"
        );
        assert_eq!(
            media_filename(MediaKind::Video, "not a url", 7, 1),
            "video_7_1.mp4"
        );
    }

    #[test]
    fn test_options_from_config() {
        let config = DeliveryConfig {
            media_attempts: 4,
            video_timeout_secs: 45,
            ..DeliveryConfig::default()
        };
        let options = MediaOptions::from_config(&config);
        assert_eq!(options.attempts, 4);
        assert_eq!(options.timeout(MediaKind::Video), Duration::from_secs(45));
        assert_eq!(options.timeout(MediaKind::Image), Duration::from_secs(10));
        assert_eq!(options.retry_delay, Duration::from_secs(2));
    }
}
