//! Sink implementations

pub mod log;
pub mod webhook;

pub use log::LogSink;
pub use webhook::DiscordWebhookSink;
