//! LogSink - dry-run sink that logs units via tracing

use contracts::{ContractError, DeliveryUnit, EndpointKey, SinkResponse, WebhookSink};
use tracing::{info, instrument};

/// Sink that logs unit summaries instead of sending them
pub struct LogSink {
    name: String,
    key: EndpointKey,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: EndpointKey::new(format!("LOG:{name}")),
            name,
        }
    }

    fn log_unit_summary(&self, unit: &DeliveryUnit) {
        let attachments = unit.attachments();
        let bytes: usize = attachments.iter().map(|a| a.len()).sum();

        match unit {
            DeliveryUnit::Embed(embed) => info!(
                sink = %self.name,
                title = %embed.title,
                link = %embed.link,
                footer = embed.footer.as_deref().unwrap_or(""),
                chars = embed.description.as_ref().map_or(0, |d| d.chars().count()),
                files = attachments.len(),
                bytes,
                "Embed unit"
            ),
            DeliveryUnit::PlainLink(link) => info!(
                sink = %self.name,
                content = %link.content,
                "Link unit"
            ),
        }
    }
}

impl WebhookSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint_key(&self) -> &EndpointKey {
        &self.key
    }

    #[instrument(
        name = "log_sink_send",
        skip(self, unit),
        fields(sink = %self.name, kind = unit.kind())
    )]
    async fn send(&self, unit: &DeliveryUnit) -> Result<SinkResponse, ContractError> {
        self.log_unit_summary(unit);
        Ok(SinkResponse::new(204))
    }
}
