//! RelayConfig - Config Loader output
//!
//! Describes the complete relay: downstream webhook, delivery options,
//! limiter budgets, polling cadence, ledger location and monitored sources.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use crate::ContractError;

/// Text posted for a sequence whose content could not be recovered.
pub const DEFAULT_PLACEHOLDER_TEXT: &str = "Unable to parse this message. Try heading to the message link leading to preview page or Telegram.";

/// Complete relay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct RelayConfig {
    /// Default downstream target
    #[serde(default)]
    #[validate(nested)]
    pub webhook: WebhookConfig,

    /// Unit construction and retry options
    #[serde(default)]
    #[validate(nested)]
    pub delivery: DeliveryConfig,

    /// Rate limiter budgets
    #[serde(default)]
    #[validate(nested)]
    pub limiter: LimiterConfig,

    /// Polling options
    #[serde(default)]
    #[validate(nested)]
    pub ingestion: IngestionConfig,

    /// Delivery ledger location
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Monitored channels
    #[serde(default)]
    #[validate(length(min = 1, message = "at least one source is required"))]
    pub sources: Vec<SourceConfig>,
}

impl RelayConfig {
    /// Downstream target for a source: its override, else the global webhook.
    ///
    /// Returns `(webhook_url, thread_id)`.
    pub fn target_for<'a>(
        &'a self,
        source: &'a SourceConfig,
    ) -> Option<(&'a str, Option<&'a str>)> {
        match source.webhook_url.as_deref() {
            Some(url) => Some((url, source.thread_id.as_deref())),
            None => self.webhook.url.as_deref().map(|url| {
                let thread = source
                    .thread_id
                    .as_deref()
                    .or(self.webhook.thread_id.as_deref());
                (url, thread)
            }),
        }
    }
}

/// Default webhook
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WebhookConfig {
    /// `https://discord.com/api/webhooks/<id>/<token>`
    #[serde(default)]
    pub url: Option<String>,

    /// Thread to post into (`?thread_id=`)
    #[serde(default)]
    pub thread_id: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_webhook_timeout")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
}

fn default_webhook_timeout() -> u64 {
    30
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            thread_id: None,
            timeout_secs: default_webhook_timeout(),
        }
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Unit construction and retry options
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeliveryConfig {
    /// Embed accent colour as hex (`89a7d9`, `#89a7d9`, `0x89a7d9`);
    /// a random colour is picked at startup when omitted
    #[serde(default)]
    pub embed_color: Option<String>,

    /// Text of gap placeholders
    #[serde(default = "default_placeholder_text")]
    #[validate(length(min = 1))]
    pub placeholder_text: String,

    /// Retry budget per unit
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Image download timeout (seconds)
    #[serde(default = "default_media_timeout")]
    #[validate(range(min = 1))]
    pub media_timeout_secs: u64,

    /// Video download timeout (seconds)
    #[serde(default = "default_video_timeout")]
    #[validate(range(min = 1))]
    pub video_timeout_secs: u64,

    /// Download attempts per media item
    #[serde(default = "default_media_attempts")]
    #[validate(range(min = 1))]
    pub media_attempts: u32,
}

fn default_placeholder_text() -> String {
    DEFAULT_PLACEHOLDER_TEXT.to_string()
}

fn default_max_retries() -> u32 {
    5
}

fn default_media_timeout() -> u64 {
    10
}

fn default_video_timeout() -> u64 {
    30
}

fn default_media_attempts() -> u32 {
    3
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            embed_color: None,
            placeholder_text: default_placeholder_text(),
            max_retries: default_max_retries(),
            media_timeout_secs: default_media_timeout(),
            video_timeout_secs: default_video_timeout(),
            media_attempts: default_media_attempts(),
        }
    }
}

impl DeliveryConfig {
    /// Parsed embed colour, `None` when not configured.
    pub fn parsed_color(&self) -> Result<Option<u32>, ContractError> {
        self.embed_color.as_deref().map(parse_hex_color).transpose()
    }
}

/// Parse `89a7d9`, `#89a7d9` or `0x89a7d9`.
pub fn parse_hex_color(raw: &str) -> Result<u32, ContractError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix('#')
        .or_else(|| trimmed.strip_prefix("0x"))
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let value = u32::from_str_radix(digits, 16).map_err(|e| {
        ContractError::config_validation("delivery.embed_color", format!("'{raw}': {e}"))
    })?;
    if value > 0xFF_FF_FF {
        return Err(ContractError::config_validation(
            "delivery.embed_color",
            format!("'{raw}' exceeds 0xFFFFFF"),
        ));
    }
    Ok(value)
}

/// Rate limiter budgets
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LimiterConfig {
    /// Requests admitted per global window
    #[serde(default = "default_global_limit")]
    #[validate(range(min = 1))]
    pub global_limit: u32,

    /// Global window length (milliseconds)
    #[serde(default = "default_global_window_ms")]
    #[validate(range(min = 1))]
    pub global_window_ms: u64,

    /// 401/403/429 responses tolerated per invalid-request window
    #[serde(default = "default_invalid_limit")]
    #[validate(range(min = 1))]
    pub invalid_request_limit: u32,

    /// Invalid-request window length (seconds)
    #[serde(default = "default_invalid_window")]
    #[validate(range(min = 1))]
    pub invalid_request_window_secs: u64,

    /// Backoff ceiling for 5xx and network failures (seconds)
    #[serde(default = "default_max_backoff")]
    #[validate(range(min = 1))]
    pub max_backoff_secs: u64,
}

fn default_global_limit() -> u32 {
    50
}

fn default_global_window_ms() -> u64 {
    1000
}

fn default_invalid_limit() -> u32 {
    9000
}

fn default_invalid_window() -> u64 {
    600
}

fn default_max_backoff() -> u64 {
    60
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            global_limit: default_global_limit(),
            global_window_ms: default_global_window_ms(),
            invalid_request_limit: default_invalid_limit(),
            invalid_request_window_secs: default_invalid_window(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

/// Polling options
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IngestionConfig {
    /// Sleep between fetch cycles (seconds)
    #[serde(default = "default_poll_interval")]
    #[validate(range(min = 1))]
    pub poll_interval_secs: u64,

    /// Feed page download attempts per cycle
    #[serde(default = "default_fetch_attempts")]
    #[validate(range(min = 1))]
    pub fetch_attempts: u32,
}

fn default_poll_interval() -> u64 {
    300
}

fn default_fetch_attempts() -> u32 {
    5
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            fetch_attempts: default_fetch_attempts(),
        }
    }
}

impl IngestionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Ledger location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite file; `:memory:` keeps the ledger in memory
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/ledger.db")
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

/// One monitored channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SourceConfig {
    /// Channel name or `https://t.me/<channel>` url
    #[validate(length(min = 1))]
    pub channel: String,

    /// Webhook override for this source
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Thread override for this source
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl SourceConfig {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            webhook_url: None,
            thread_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.limiter.global_limit, 50);
        assert_eq!(config.limiter.invalid_request_limit, 9000);
        assert_eq!(config.ingestion.poll_interval_secs, 300);
        assert_eq!(config.delivery.max_retries, 5);
        assert_eq!(config.delivery.placeholder_text, DEFAULT_PLACEHOLDER_TEXT);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("89a7d9").unwrap(), 0x89a7d9);
        assert_eq!(parse_hex_color("#FFFFFF").unwrap(), 0xFFFFFF);
        assert_eq!(parse_hex_color("0x000001").unwrap(), 1);
        assert!(parse_hex_color("1000000").is_err());
        assert!(parse_hex_color("zzz").is_err());
    }

    #[test]
    fn test_target_prefers_source_override() {
        let mut config = RelayConfig::default();
        config.webhook.url = Some("https://discord.com/api/webhooks/1/a".into());
        config.webhook.thread_id = Some("10".into());

        let plain = SourceConfig::new("alpha");
        assert_eq!(
            config.target_for(&plain),
            Some(("https://discord.com/api/webhooks/1/a", Some("10")))
        );

        let mut routed = SourceConfig::new("beta");
        routed.webhook_url = Some("https://discord.com/api/webhooks/2/b".into());
        assert_eq!(
            config.target_for(&routed),
            Some(("https://discord.com/api/webhooks/2/b", None))
        );
    }

    #[test]
    fn test_validator_rejects_zero_limits() {
        let mut config = RelayConfig::default();
        config.sources.push(SourceConfig::new("alpha"));
        assert!(config.validate().is_ok());

        config.limiter.global_limit = 0;
        assert!(config.validate().is_err());
    }
}
