//! DiscordWebhookSink - posts delivery units to a webhook

use std::time::Duration;

use contracts::{ContractError, DeliveryUnit, EndpointKey, SinkResponse, WebhookSink};
use reqwest::multipart::{Form, Part};
use tracing::{debug, instrument};

use crate::error::DispatchError;
use crate::payload::WebhookPayload;

/// Sink that POSTs units to a Discord-compatible webhook
pub struct DiscordWebhookSink {
    name: String,
    url: String,
    key: EndpointKey,
    client: reqwest::Client,
}

impl DiscordWebhookSink {
    /// Create a sink for `webhook_url`, optionally posting into `thread_id`.
    pub fn new(
        name: impl Into<String>,
        webhook_url: &str,
        thread_id: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::sink_creation(&name, e.to_string()))?;

        Ok(Self {
            url: target_url(webhook_url, thread_id),
            key: EndpointKey::for_webhook(webhook_url),
            name,
            client,
        })
    }

    /// Request url, including the thread query
    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_form(&self, unit: &DeliveryUnit, payload: String) -> Result<Form, ContractError> {
        let mut form = Form::new().text("payload_json", payload);
        for (index, attachment) in unit.attachments().into_iter().enumerate() {
            let part = Part::bytes(attachment.bytes.to_vec())
                .file_name(attachment.filename.clone())
                .mime_str(&attachment.content_type)
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
            form = form.part(format!("files[{index}]"), part);
        }
        Ok(form)
    }

    fn map_send_error(&self, err: reqwest::Error) -> ContractError {
        if err.is_timeout() {
            ContractError::timeout(err.to_string())
        } else if err.is_builder() {
            ContractError::sink_write(&self.name, err.to_string())
        } else {
            ContractError::transport(err.to_string())
        }
    }
}

/// Append `thread_id` to a webhook url.
pub fn target_url(webhook_url: &str, thread_id: Option<&str>) -> String {
    match thread_id {
        Some(thread) => {
            let separator = if webhook_url.contains('?') { '&' } else { '?' };
            format!("{webhook_url}{separator}thread_id={thread}")
        }
        None => webhook_url.to_string(),
    }
}

impl WebhookSink for DiscordWebhookSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint_key(&self) -> &EndpointKey {
        &self.key
    }

    #[instrument(
        name = "webhook_sink_send",
        skip(self, unit),
        fields(sink = %self.name, kind = unit.kind())
    )]
    async fn send(&self, unit: &DeliveryUnit) -> Result<SinkResponse, ContractError> {
        let payload = WebhookPayload::from_unit(unit);
        let request = self.client.post(&self.url);
        let request = if unit.has_attachments() {
            let json = serde_json::to_string(&payload)
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
            request.multipart(self.build_form(unit, json)?)
        } else {
            request.json(&payload)
        };

        let resp = request.send().await.map_err(|e| self.map_send_error(e))?;

        let mut response = SinkResponse::new(resp.status().as_u16());
        for (name, value) in resp.headers() {
            if let Ok(value) = value.to_str() {
                response = response.with_header(name.as_str(), value);
            }
        }
        let body = resp.bytes().await.map_err(|e| self.map_send_error(e))?;
        response.body = serde_json::from_slice(&body).ok();

        debug!(status = response.status, bytes = body.len(), "Webhook answered");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_url() {
        assert_eq!(
            target_url("https://discord.com/api/webhooks/1/abc", Some("42")),
            "https://discord.com/api/webhooks/1/abc?thread_id=42"
        );
        assert_eq!(
            target_url("https://discord.com/api/webhooks/1/abc?wait=true", Some("42")),
            "https://discord.com/api/webhooks/1/abc?wait=true&thread_id=42"
        );
        assert_eq!(
            target_url("https://discord.com/api/webhooks/1/abc", None),
            "https://discord.com/api/webhooks/1/abc"
        );
    }

    #[test]
    fn test_sink_key_ignores_thread() {
        let sink = DiscordWebhookSink::new(
            "durov",
            "https://discord.com/api/webhooks/123/abcdefghijkl",
            Some("9"),
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(sink.endpoint_key().as_str(), "POST:webhook:123:abcdefgh");
        assert_eq!(sink.name(), "durov");
        assert!(sink.url().ends_with("?thread_id=9"));
    }
}
