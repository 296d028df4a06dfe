//! WebhookSink trait - downstream endpoint interface
//!
//! Defines the abstract interface for delivery targets.

use std::collections::HashMap;

use crate::{ContractError, DeliveryUnit, EndpointKey};

/// Raw downstream answer, consumed by the rate limiter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinkResponse {
    pub status: u16,
    /// Response headers, names lower-cased
    pub headers: HashMap<String, String>,
    /// Parsed JSON body, when the body was JSON
    pub body: Option<serde_json::Value>,
}

impl SinkResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Add a header (name is lower-cased).
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Webhook delivery trait
///
/// All sink implementations must implement this trait. A sink answers any
/// HTTP status with `Ok`; `Err` is reserved for failures where no response
/// was received.
#[trait_variant::make(WebhookSink: Send)]
pub trait LocalWebhookSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Rate limit key for every request this sink issues
    fn endpoint_key(&self) -> &EndpointKey;

    /// Send one unit
    ///
    /// # Errors
    /// Returns a transport error when the request never produced a response
    async fn send(&self, unit: &DeliveryUnit) -> Result<SinkResponse, ContractError>;
}
