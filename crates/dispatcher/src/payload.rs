//! Webhook JSON payloads

use contracts::{DeliveryUnit, EmbedUnit};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebhookPayload {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<EmbedPayload>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedPayload {
    pub title: String,
    pub url: String,
    pub color: u32,
    pub author: AuthorPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImagePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<FooterPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuthorPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImagePayload {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FooterPayload {
    pub text: String,
}

impl WebhookPayload {
    pub fn from_unit(unit: &DeliveryUnit) -> Self {
        let author = unit.author();
        let (content, embeds) = match unit {
            DeliveryUnit::Embed(embed) => (None, vec![EmbedPayload::from_embed(embed)]),
            DeliveryUnit::PlainLink(link) => (Some(link.content.clone()), Vec::new()),
        };
        Self {
            username: author.name.clone(),
            avatar_url: author.icon.clone(),
            content,
            embeds,
        }
    }
}

impl EmbedPayload {
    fn from_embed(embed: &EmbedUnit) -> Self {
        Self {
            title: embed.title.clone(),
            url: embed.link.clone(),
            color: embed.color,
            author: AuthorPayload {
                name: embed.author.name.clone(),
                icon_url: embed.author.icon.clone(),
                url: embed.author.link.clone(),
            },
            description: embed.description.clone(),
            image: embed.image.as_ref().map(|image| ImagePayload {
                url: format!("attachment://{}", image.filename),
            }),
            footer: embed.footer.clone().map(|text| FooterPayload { text }),
            timestamp: embed.timestamp.map(|ts| ts.to_rfc3339()),
        }
    }
}
