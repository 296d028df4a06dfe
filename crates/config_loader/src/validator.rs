//! Configuration validation
//!
//! Rules:
//! - field ranges (`validator` derive on the config types)
//! - at least one source
//! - channel identifiers usable and unique after normalization
//! - every source resolves to a webhook url with a `/webhooks/<id>` path
//! - thread ids are numeric
//! - embed colour parses as hex <= 0xFFFFFF

use std::collections::HashSet;
use std::sync::LazyLock;

use contracts::{parse_hex_color, ContractError, RelayConfig, SourceId};
use regex::Regex;
use ::validator::Validate;

static WEBHOOK_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[^/\s]+(/[^\s?#]*)?/webhooks/[^/\s?#]+").expect("static regex")
});

/// Validate a RelayConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &RelayConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_sources(config)?;
    validate_targets(config)?;
    validate_embed_color(config)?;
    Ok(())
}

/// Range checks declared on the config types
fn validate_fields(config: &RelayConfig) -> Result<(), ContractError> {
    config
        .validate()
        .map_err(|errors| ContractError::config_validation("config", errors.to_string()))
}

/// Channel identifiers: usable and unique
fn validate_sources(config: &RelayConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, source) in config.sources.iter().enumerate() {
        let id = SourceId::parse(&source.channel).map_err(|_| {
            ContractError::config_validation(
                format!("sources[{idx}].channel"),
                format!(
                    "'{}' must be 3-64 characters of [A-Za-z0-9_], optionally prefixed by https://t.me/",
                    source.channel
                ),
            )
        })?;
        if !seen.insert(id.clone()) {
            return Err(ContractError::config_validation(
                format!("sources[{idx}].channel"),
                format!("duplicate channel '{id}'"),
            ));
        }
    }
    Ok(())
}

/// Every source needs a downstream target
fn validate_targets(config: &RelayConfig) -> Result<(), ContractError> {
    if let Some(url) = config.webhook.url.as_deref() {
        check_webhook_url("webhook.url", url)?;
    }
    if let Some(thread) = config.webhook.thread_id.as_deref() {
        check_thread_id("webhook.thread_id", thread)?;
    }

    for (idx, source) in config.sources.iter().enumerate() {
        if let Some(url) = source.webhook_url.as_deref() {
            check_webhook_url(&format!("sources[{idx}].webhook_url"), url)?;
        }
        if let Some(thread) = source.thread_id.as_deref() {
            check_thread_id(&format!("sources[{idx}].thread_id"), thread)?;
        }
        if config.target_for(source).is_none() {
            return Err(ContractError::config_validation(
                format!("sources[{idx}]"),
                format!(
                    "no webhook for '{}': set webhook.url or sources[{idx}].webhook_url",
                    source.channel
                ),
            ));
        }
    }
    Ok(())
}

fn check_webhook_url(field: &str, url: &str) -> Result<(), ContractError> {
    if WEBHOOK_URL.is_match(url) {
        Ok(())
    } else {
        Err(ContractError::config_validation(
            field,
            "webhook url must look like https://<host>/api/webhooks/<id>/<token>",
        ))
    }
}

fn check_thread_id(field: &str, thread: &str) -> Result<(), ContractError> {
    if !thread.is_empty() && thread.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ContractError::config_validation(
            field,
            format!("thread id must be numeric, got '{thread}'"),
        ))
    }
}

fn validate_embed_color(config: &RelayConfig) -> Result<(), ContractError> {
    config.delivery.parsed_color().map(|_| ())
}
