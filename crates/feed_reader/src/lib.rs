//! # Feed Reader
//!
//! Reads the public web preview of a Telegram channel (`https://t.me/s/<channel>`)
//! and turns every message on the page into a [`contracts::MessageRecord`].
//!
//! - [`parse`]: HTML page to records, Markdown rendering of message bodies
//! - [`TelegramFeed`]: HTTP [`contracts::FeedSource`] with retry and the
//!   individual-page text fallback for grouped media posts

mod error;
mod markdown;
pub mod parse;
mod telegram;

pub use error::FeedReaderError;
pub use markdown::render_markdown;
pub use telegram::{FeedOptions, TelegramFeed};
