//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::RelayConfig;
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    source_count: usize,
    routed_sources: usize,
    poll_interval_secs: u64,
    max_retries: u32,
    ledger: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.config.display().to_string();

    match load_config(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    source_count: config.sources.len(),
                    routed_sources: config
                        .sources
                        .iter()
                        .filter(|s| s.webhook_url.is_some())
                        .count(),
                    poll_interval_secs: config.ingestion.poll_interval_secs,
                    max_retries: config.delivery.max_retries,
                    ledger: config.ledger.path.display().to_string(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &RelayConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.delivery.embed_color.is_none() {
        warnings.push(
            "delivery.embed_color not set - a random colour is picked at startup".to_string(),
        );
    }

    if config.ledger.path.as_os_str() == ":memory:" {
        warnings.push(
            "ledger.path is :memory: - delivered posts are forgotten on restart".to_string(),
        );
    }

    if config.delivery.max_retries == 0 {
        warnings.push("delivery.max_retries is 0 - failed units are never retried".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Sources: {}", summary.source_count);
            println!("  With own webhook: {}", summary.routed_sources);
            println!("  Poll interval: {}s", summary.poll_interval_secs);
            println!("  Max retries: {}", summary.max_retries);
            println!("  Ledger: {}", summary.ledger);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
