//! Feed reader error types

use contracts::ContractError;
use thiserror::Error;

/// Feed reader specific error
#[derive(Debug, Error)]
pub enum FeedReaderError {
    /// HTTP client could not be built
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    /// Request never produced a response
    #[error("request to '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status
    #[error("'{url}' answered with status {status}")]
    Status { url: String, status: u16 },

    /// Retries used up
    #[error("giving up on '{url}' after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<FeedReaderError>,
    },
}

impl FeedReaderError {
    pub fn request(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Request {
            url: url.into(),
            source,
        }
    }

    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    /// Whether the failure is a client timeout
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Request { source, .. } => source.is_timeout(),
            Self::Exhausted { last, .. } => last.is_timeout(),
            Self::Status { .. } | Self::Client(_) => false,
        }
    }

    /// Convert into the shared error type, attributed to `source_id`
    pub fn into_contract(self, source_id: &str) -> ContractError {
        ContractError::feed(source_id, self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FeedReaderError>;
