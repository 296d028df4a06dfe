//! HTTP feed source for Telegram channel previews

use std::time::Duration;

use contracts::{ContractError, FeedSource, IngestionConfig, MessageRecord, SourceId};
use tracing::{debug, info, instrument, warn};

use crate::error::{FeedReaderError, Result};
use crate::parse::{parse_individual_text, parse_page};

const USER_AGENT: &str = concat!("relay/", env!("CARGO_PKG_VERSION"));

/// Retry and timeout knobs of [`TelegramFeed`]
#[derive(Debug, Clone)]
pub struct FeedOptions {
    /// Preview page attempts per fetch
    pub fetch_attempts: u32,
    /// First delay between preview page attempts, doubled each retry
    pub retry_delay: Duration,
    /// Single-message page attempts for the text fallback
    pub page_attempts: u32,
    /// First delay between single-message page attempts
    pub page_retry_delay: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            fetch_attempts: 5,
            retry_delay: Duration::from_secs(2),
            page_attempts: 3,
            page_retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl FeedOptions {
    pub fn from_config(config: &IngestionConfig) -> Self {
        Self {
            fetch_attempts: config.fetch_attempts.max(1),
            ..Self::default()
        }
    }
}

/// Reads `https://t.me/s/<channel>`.
#[derive(Debug, Clone)]
pub struct TelegramFeed {
    client: reqwest::Client,
    options: FeedOptions,
}

impl TelegramFeed {
    pub fn new(options: FeedOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.request_timeout)
            .build()
            .map_err(FeedReaderError::Client)?;
        Ok(Self { client, options })
    }

    pub fn options(&self) -> &FeedOptions {
        &self.options
    }

    /// GET `url` as text, retrying with a doubling delay.
    async fn get_text(&self, url: &str, attempts: u32, first_delay: Duration) -> Result<String> {
        let attempts = attempts.max(1);
        let mut delay = first_delay;
        let mut attempt = 1;
        loop {
            let err = match self.get_once(url).await {
                Ok(body) => return Ok(body),
                Err(err) => err,
            };
            if attempt >= attempts {
                return Err(FeedReaderError::Exhausted {
                    url: url.to_string(),
                    attempts,
                    last: Box::new(err),
                });
            }
            warn!(url, attempt, error = %err, "request failed, retrying in {:?}", delay);
            tokio::time::sleep(delay).await;
            delay *= 2;
            attempt += 1;
        }
    }

    async fn get_once(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedReaderError::request(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FeedReaderError::status(url, status.as_u16()));
        }
        resp.text()
            .await
            .map_err(|e| FeedReaderError::request(url, e))
    }

    /// Text of a single message page, `None` when nothing usable was found.
    async fn individual_text(&self, record: &MessageRecord) -> Option<String> {
        match self
            .get_text(
                &record.permalink,
                self.options.page_attempts,
                self.options.page_retry_delay,
            )
            .await
        {
            Ok(html) => parse_individual_text(&html),
            Err(err) => {
                warn!(permalink = %record.permalink, error = %err, "message page unavailable");
                None
            }
        }
    }
}

impl FeedSource for TelegramFeed {
    #[instrument(name = "feed_fetch", skip(self), fields(source = %source))]
    async fn fetch(
        &self,
        source: &SourceId,
    ) -> std::result::Result<Vec<MessageRecord>, ContractError> {
        let url = source.feed_url();
        let html = self
            .get_text(&url, self.options.fetch_attempts, self.options.retry_delay)
            .await
            .map_err(|e| e.into_contract(source.as_str()))?;

        let mut records = parse_page(&html, source);
        debug!(count = records.len(), "parsed preview page");

        // grouped posts often carry their caption only on the message page
        for record in records
            .iter_mut()
            .filter(|r| r.media_count() > 1 && r.text.trim().is_empty())
        {
            if let Some(text) = self.individual_text(record).await {
                info!(sequence = record.sequence, "recovered grouped message text");
                record.text = text;
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let config = IngestionConfig {
            fetch_attempts: 7,
            ..IngestionConfig::default()
        };
        let options = FeedOptions::from_config(&config);
        assert_eq!(options.fetch_attempts, 7);
        assert_eq!(options.request_timeout, Duration::from_secs(10));
        assert_eq!(options.page_attempts, 3);
    }

    #[test]
    fn test_feed_builds() {
        let feed = TelegramFeed::new(FeedOptions::default()).unwrap();
        assert_eq!(feed.options().retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_exhausted_error_keeps_timeout_flag() {
        let err = FeedReaderError::Exhausted {
            url: "https://t.me/s/chan".into(),
            attempts: 5,
            last: Box::new(FeedReaderError::status("https://t.me/s/chan", 502)),
        };
        assert!(!err.is_timeout());
        let contract = err.into_contract("chan");
        assert!(contract.to_string().contains("after 5 attempts"));
    }
}
