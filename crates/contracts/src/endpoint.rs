//! EndpointKey - rate limit bucket identity
//!
//! One key per distinct endpoint + credential combination.

use std::fmt;
use std::sync::Arc;

/// Bucket identity for one downstream endpoint.
///
/// Webhook urls (`.../webhooks/<id>/<token>`) key on the id and a token
/// prefix, so two webhooks limit independently while every request to the
/// same webhook shares one bucket.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey(Arc<str>);

impl EndpointKey {
    /// Wrap an already derived key.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Derive the key for a request against `url`.
    pub fn for_url(method: &str, url: &str) -> Self {
        let without_query = url.split(['?', '#']).next().unwrap_or(url);

        if let Some((_, tail)) = without_query.split_once("/webhooks/") {
            let mut parts = tail.split('/').filter(|p| !p.is_empty());
            if let Some(id) = parts.next() {
                return match parts.next() {
                    Some(token) => {
                        let prefix: String = token.chars().take(8).collect();
                        Self::new(format!("{method}:webhook:{id}:{prefix}"))
                    }
                    None => Self::new(format!("{method}:webhook:{id}")),
                };
            }
        }

        Self::new(format!("{method}:{without_query}"))
    }

    /// Key for posting to a webhook url.
    pub fn for_webhook(url: &str) -> Self {
        Self::for_url("POST", url)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndpointKey({:?})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_key_includes_token_prefix() {
        let key = EndpointKey::for_webhook(
            "https://discord.com/api/webhooks/123456/abcdefghijklmnop?thread_id=9",
        );
        assert_eq!(key.as_str(), "POST:webhook:123456:abcdefgh");
    }

    #[test]
    fn test_same_webhook_shares_key() {
        let a = EndpointKey::for_webhook("https://discord.com/api/webhooks/1/tokentoken?thread_id=1");
        let b = EndpointKey::for_webhook("https://discord.com/api/webhooks/1/tokentoken?thread_id=2");
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_credentials_differ() {
        let a = EndpointKey::for_webhook("https://discord.com/api/webhooks/1/aaaaaaaaaa");
        let b = EndpointKey::for_webhook("https://discord.com/api/webhooks/1/bbbbbbbbbb");
        let c = EndpointKey::for_webhook("https://discord.com/api/webhooks/2/aaaaaaaaaa");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_webhook_without_token() {
        let key = EndpointKey::for_webhook("https://discord.com/api/webhooks/77");
        assert_eq!(key.as_str(), "POST:webhook:77");
    }

    #[test]
    fn test_plain_url_drops_query() {
        let key = EndpointKey::for_url("POST", "https://example.com/hook?x=1");
        assert_eq!(key.as_str(), "POST:https://example.com/hook");
    }
}
