//! `info` command implementation.

use anyhow::{Context, Result};
use config_loader::RelayConfig;
use contracts::{EndpointKey, LimiterConfig, SourceId};
use serde::Serialize;
use tracing::info;

use super::{load_config, redact_webhook};
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_id: Option<String>,
    poll_interval_secs: u64,
    max_retries: u32,
    ledger: String,
    limiter: LimiterConfig,
    source_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sources: Vec<SourceInfo>,
}

#[derive(Serialize)]
struct SourceInfo {
    channel: String,
    feed_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.config.display(), "Loading configuration info");

    let config = load_config(&args.config)?;
    let info = build_config_info(&config, args);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &RelayConfig, args: &InfoArgs) -> ConfigInfo {
    let sources = if args.sources {
        config
            .sources
            .iter()
            .map(|source| {
                let target = config.target_for(source);
                SourceInfo {
                    channel: source.channel.clone(),
                    feed_url: SourceId::parse(&source.channel)
                        .map(|id| id.feed_url())
                        .unwrap_or_default(),
                    webhook: target.map(|(url, _)| redact_webhook(url)),
                    thread_id: target.and_then(|(_, thread)| thread.map(str::to_string)),
                    endpoint: target.map(|(url, _)| EndpointKey::for_webhook(url).to_string()),
                }
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        webhook: config.webhook.url.as_deref().map(redact_webhook),
        thread_id: config.webhook.thread_id.clone(),
        poll_interval_secs: config.ingestion.poll_interval_secs,
        max_retries: config.delivery.max_retries,
        ledger: config.ledger.path.display().to_string(),
        limiter: config.limiter.clone(),
        source_count: config.sources.len(),
        sources,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Relay Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🔗 Webhook");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Url: {}", info.webhook.as_deref().unwrap_or("(per source)"));
    println!("   └─ Thread: {}", info.thread_id.as_deref().unwrap_or("-"));

    println!("\n⚙️  Delivery");
    println!("   ├─ Poll interval: {}s", info.poll_interval_secs);
    println!("   ├─ Max retries: {}", info.max_retries);
    println!("   └─ Ledger: {}", info.ledger);

    let limiter = &info.limiter;
    println!("\n🚦 Rate Limits");
    println!(
        "   ├─ Global: {} requests / {}ms",
        limiter.global_limit, limiter.global_window_ms
    );
    println!(
        "   ├─ Invalid requests: {} / {}s",
        limiter.invalid_request_limit, limiter.invalid_request_window_secs
    );
    println!("   └─ Max backoff: {}s", limiter.max_backoff_secs);

    println!("\n📡 Sources ({})", info.source_count);
    for (i, source) in info.sources.iter().enumerate() {
        let is_last = i == info.sources.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child = if is_last { "   " } else { "│  " };
        println!("   {} {} ({})", prefix, source.channel, source.feed_url);
        println!(
            "   {}  └─ {} thread {}",
            child,
            source.endpoint.as_deref().unwrap_or("(no webhook)"),
            source.thread_id.as_deref().unwrap_or("-")
        );
    }

    println!();
}
