//! Dispatcher error types

use rate_limiter::DeliveryError;
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// A delivery unit of a record could not be sent
    #[error("unit {index} of record {sequence} failed: {source}")]
    Unit {
        sequence: u64,
        index: usize,
        #[source]
        source: DeliveryError,
    },

    /// Sink write error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatchError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn unit(sequence: u64, index: usize, source: DeliveryError) -> Self {
        Self::Unit {
            sequence,
            index,
            source,
        }
    }

    /// Underlying delivery failure, if any
    pub fn delivery(&self) -> Option<&DeliveryError> {
        match self {
            Self::Unit { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Metric label
    pub fn reason(&self) -> &'static str {
        match self {
            Self::SinkCreation { .. } => "sink_creation",
            Self::Unit { source, .. } => source.reason(),
            Self::Contract(_) => "contract",
        }
    }
}
