//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use config_loader::ConfigOverrides;
use std::path::PathBuf;

/// Relay - mirrors public channel feeds into webhooks
#[derive(Parser, Debug)]
#[command(
    name = "relay",
    author,
    version,
    about = "Mirror public channel feeds into Discord webhooks",
    long_about = "Polls public channel preview pages, converts new posts into webhook embeds \n\
                  and delivers them in order under the endpoint's rate limits.\n\n\
                  Missing posts are replaced by placeholders, delivered posts are recorded \n\
                  in a ledger so restarts never post twice."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the configured sources and deliver new posts
    Run(RunArgs),

    /// Validate configuration without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Configuration file plus environment overrides, shared by every command
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to configuration file (TOML or JSON); optional when the
    /// environment provides a webhook and channels
    #[arg(short, long, default_value = "relay.toml", env = "RELAY_CONFIG")]
    pub config: PathBuf,

    /// Override the default webhook url
    #[arg(long, env = "RELAY_WEBHOOK_URL", hide_env_values = true)]
    pub webhook_url: Option<String>,

    /// Extra channels to monitor (comma separated)
    #[arg(long, env = "RELAY_CHANNELS")]
    pub channels: Option<String>,

    /// Override the default thread id
    #[arg(long, env = "RELAY_THREAD_ID")]
    pub thread_id: Option<String>,

    /// Override the embed colour (hex)
    #[arg(long, env = "RELAY_EMBED_COLOR")]
    pub embed_color: Option<String>,

    /// Override the poll interval in seconds
    #[arg(long, env = "RELAY_POLL_INTERVAL")]
    pub poll_interval: Option<u64>,
}

impl ConfigArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            webhook_url: self.webhook_url.clone(),
            thread_id: self.thread_id.clone(),
            channels: self
                .channels
                .as_deref()
                .map(ConfigOverrides::parse_channels)
                .unwrap_or_default(),
            embed_color: self.embed_color.clone(),
            poll_interval_secs: self.poll_interval,
        }
    }
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Log units instead of posting them
    #[arg(long)]
    pub dry_run: bool,

    /// Run a single fetch cycle per source and exit
    #[arg(long)]
    pub once: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "RELAY_METRICS_PORT")]
    pub metrics_port: u16,

    /// Seconds in-flight records get to finish after a shutdown signal
    #[arg(long, default_value = "30", env = "RELAY_GRACE_SECS")]
    pub grace_secs: u64,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show per-source targets
    #[arg(long)]
    pub sources: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
