//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_relay;
pub use validate::run_validate;

use config_loader::{ConfigLoader, RelayConfig};

use crate::cli::ConfigArgs;
use crate::error::CliError;

/// Load the config file (if present) and apply environment overrides.
fn load_config(args: &ConfigArgs) -> Result<RelayConfig, CliError> {
    ConfigLoader::load_with_overrides(Some(args.config.as_path()), &args.overrides())
        .map_err(|e| CliError::config(args.config.display().to_string(), e.to_string()))
}

/// Hide the token part of a webhook url.
fn redact_webhook(url: &str) -> String {
    match url.find("/webhooks/") {
        Some(start) => {
            let rest = &url[start + "/webhooks/".len()..];
            let id = rest.split('/').next().unwrap_or_default();
            format!("{}/webhooks/{id}/****", &url[..start])
        }
        None => url.to_string(),
    }
}
