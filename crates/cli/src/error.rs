//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid
    #[error("Failed to load configuration from {path}: {message}")]
    Config { path: String, message: String },

    /// A collaborator (feed, sink, media fetcher, ledger) could not be built
    #[error("Failed to set up {component}: {message}")]
    Setup { component: String, message: String },

    /// No source loop could be started
    #[error("No source could be started ({failed} failed)")]
    NoSources { failed: usize },

    /// Signal handler installation error
    #[error("Error during shutdown: {message}")]
    Shutdown { message: String },
}

impl CliError {
    pub fn config(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn setup(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Setup {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::Shutdown {
            message: message.into(),
        }
    }
}
