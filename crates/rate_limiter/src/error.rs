//! Limiter and delivery errors

use contracts::FailureKind;
use thiserror::Error;

/// Capacity wait error
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// The cancellation token fired while waiting
    #[error("rate limit wait cancelled")]
    Cancelled,
}

/// Outcome of a failed send-with-retry cycle
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Not retryable (auth failure, missing target, rejected payload)
    #[error("permanent failure ({kind}): {message}")]
    Permanent {
        kind: FailureKind,
        status: Option<u16>,
        message: String,
    },

    /// Retry budget spent on retryable failures
    #[error("retries exhausted after {attempts} attempts (last: {last})")]
    RetriesExhausted { attempts: u32, last: FailureKind },

    /// Shutdown aborted the wait
    #[error("delivery cancelled")]
    Cancelled,
}

impl DeliveryError {
    pub fn permanent(kind: FailureKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Permanent {
            kind,
            status,
            message: message.into(),
        }
    }

    /// Failure kind for logs and metrics (`None` when cancelled)
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Permanent { kind, .. } => Some(*kind),
            Self::RetriesExhausted { last, .. } => Some(*last),
            Self::Cancelled => None,
        }
    }

    /// Metric label
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Permanent { kind, .. } => kind.as_str(),
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<RateLimitError> for DeliveryError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Cancelled => Self::Cancelled,
        }
    }
}
