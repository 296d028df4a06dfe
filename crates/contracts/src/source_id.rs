//! SourceId - Cheap-to-clone feed channel identifier
//!
//! Uses Arc<str> internally so loops, units and log fields can share it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::ContractError;

const CHANNEL_URL_PREFIXES: &[&str] = &["https://t.me/s/", "https://t.me/", "t.me/"];

/// Public channel identifier.
///
/// Always stored in its bare form (`durov`, not `https://t.me/durov`).
///
/// # Examples
/// ```
/// use contracts::SourceId;
///
/// let id = SourceId::parse("https://t.me/durov").unwrap();
/// assert_eq!(id.as_str(), "durov");
/// assert_eq!(id.permalink(42), "https://t.me/durov/42");
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(Arc<str>);

impl SourceId {
    /// Create a SourceId without validation.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Normalize and validate a channel reference.
    ///
    /// Accepts a bare channel name or a `t.me` url; the name must be
    /// 3..=64 characters of `[A-Za-z0-9_]`.
    pub fn parse(raw: &str) -> Result<Self, ContractError> {
        let trimmed = raw.trim().trim_end_matches('/');
        let bare = CHANNEL_URL_PREFIXES
            .iter()
            .find_map(|prefix| trimmed.strip_prefix(prefix))
            .unwrap_or(trimmed);

        let valid_len = (3..=64).contains(&bare.len());
        let valid_chars = bare.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_len || !valid_chars {
            return Err(ContractError::config_validation(
                "channel",
                format!("'{raw}' is not a usable channel identifier"),
            ));
        }
        Ok(Self::new(bare))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Public preview page listing the latest records.
    pub fn feed_url(&self) -> String {
        format!("https://t.me/s/{}", self.0)
    }

    /// Permalink of one record of this channel.
    pub fn permalink(&self, sequence: u64) -> String {
        format!("https://t.me/{}/{}", self.0, sequence)
    }
}

impl Deref for SourceId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for SourceId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SourceId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    #[inline]
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SourceId {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceId({:?})", self.0)
    }
}

impl PartialEq<str> for SourceId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for SourceId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl Serialize for SourceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SourceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}
