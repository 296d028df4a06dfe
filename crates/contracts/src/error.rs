//! Layered error definitions
//!
//! Categorized by source: config / feed / media / transport / sink / ledger

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Feed Errors =====
    /// Feed fetch or parse failure for a source
    #[error("feed error for source '{source_id}': {message}")]
    Feed { source_id: String, message: String },

    // ===== Media Errors =====
    /// Media download failure
    #[error("media fetch error for '{url}': {message}")]
    Media { url: String, message: String },

    // ===== Transport Errors =====
    /// Network-level failure (timeout, connection reset, DNS)
    #[error("transport error: {message}")]
    Transport { message: String, timeout: bool },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== Ledger Errors =====
    /// Ledger read/write error
    #[error("ledger error: {message}")]
    Ledger { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create feed error
    pub fn feed(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Feed {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create media fetch error
    pub fn media(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Media {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timeout: false,
        }
    }

    /// Create transport timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timeout: true,
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create ledger error
    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger {
            message: message.into(),
        }
    }

    /// Whether the error happened below HTTP (no response was received)
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Io(_))
    }
}

/// Failure taxonomy for outbound deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Timeout or connection failure, retried with exponential backoff
    TransientNetwork,
    /// 429, retried after the endpoint-dictated delay
    RateLimited,
    /// 401/403, permanent
    AuthFailure,
    /// 404, permanent
    NotFound,
    /// 5xx, retried with capped backoff
    ServerError,
    /// 429 without a usable retry directive, retried after a conservative delay
    MalformedUpstreamResponse,
    /// Any other 4xx (bad payload, too large), permanent
    Rejected,
}

impl FailureKind {
    /// Whether a retry can possibly succeed
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::TransientNetwork
                | Self::RateLimited
                | Self::ServerError
                | Self::MalformedUpstreamResponse
        )
    }

    /// Stable label for logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransientNetwork => "transient_network",
            Self::RateLimited => "rate_limited",
            Self::AuthFailure => "auth_failure",
            Self::NotFound => "not_found",
            Self::ServerError => "server_error",
            Self::MalformedUpstreamResponse => "malformed_upstream_response",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_message() {
        let err = ContractError::config_validation("sources[0].channel", "must not be empty");
        assert_eq!(
            err.to_string(),
            "config validation error at 'sources[0].channel': must not be empty"
        );
    }

    #[test]
    fn test_transport_classification() {
        assert!(ContractError::timeout("read timed out").is_transport());
        assert!(ContractError::transport("connection reset").is_transport());
        assert!(!ContractError::sink_write("discord", "bad payload").is_transport());
    }

    #[test]
    fn test_failure_kind_retryable() {
        assert!(FailureKind::RateLimited.is_retryable());
        assert!(FailureKind::ServerError.is_retryable());
        assert!(FailureKind::MalformedUpstreamResponse.is_retryable());
        assert!(!FailureKind::AuthFailure.is_retryable());
        assert!(!FailureKind::NotFound.is_retryable());
        assert!(!FailureKind::Rejected.is_retryable());
    }
}
