//! Command-line / environment overrides layered on top of the file config.

use contracts::{RelayConfig, SourceConfig, SourceId};

/// Values that replace (or extend) what the config file says.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Replaces `webhook.url`
    pub webhook_url: Option<String>,
    /// Replaces `webhook.thread_id`
    pub thread_id: Option<String>,
    /// Appended as sources unless already configured
    pub channels: Vec<String>,
    /// Replaces `delivery.embed_color`
    pub embed_color: Option<String>,
    /// Replaces `ingestion.poll_interval_secs`
    pub poll_interval_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Split a comma separated channel list (`RELAY_CHANNELS`).
    pub fn parse_channels(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn apply(&self, config: &mut RelayConfig) {
        if let Some(url) = &self.webhook_url {
            config.webhook.url = Some(url.clone());
        }
        if let Some(thread) = &self.thread_id {
            config.webhook.thread_id = Some(thread.clone());
        }
        if let Some(color) = &self.embed_color {
            config.delivery.embed_color = Some(color.clone());
        }
        if let Some(secs) = self.poll_interval_secs {
            config.ingestion.poll_interval_secs = secs;
        }

        for channel in &self.channels {
            let normalized = SourceId::parse(channel).ok();
            let already = config.sources.iter().any(|s| {
                s.channel == *channel
                    || (normalized.is_some() && SourceId::parse(&s.channel).ok() == normalized)
            });
            if !already {
                config.sources.push(SourceConfig::new(channel.clone()));
            }
        }
    }
}
