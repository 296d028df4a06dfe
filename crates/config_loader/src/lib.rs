//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Apply command-line / environment overrides
//! - Validate configuration legality
//! - Produce a `RelayConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("relay.toml")).unwrap();
//! println!("Sources: {}", config.sources.len());
//! ```

mod overrides;
mod parser;
mod validator;

pub use contracts::RelayConfig;
pub use overrides::ConfigOverrides;
pub use parser::ConfigFormat;

use contracts::{ContractError, DeliveryConfig};
use std::path::Path;
use tracing::{debug, info};

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<RelayConfig, ContractError> {
        Self::load_with_overrides(Some(path), &ConfigOverrides::default())
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<RelayConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Load `path` when it exists (defaults otherwise), apply overrides, validate.
    ///
    /// Lets the relay run from environment variables alone.
    pub fn load_with_overrides(
        path: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<RelayConfig, ContractError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let format = Self::detect_format(path)?;
                let content = Self::read_file(path)?;
                info!(path = %path.display(), ?format, "Loading configuration");
                parser::parse(&content, format)?
            }
            Some(path) => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                RelayConfig::default()
            }
            None => RelayConfig::default(),
        };

        overrides.apply(&mut config);
        validator::validate(&config)?;
        Ok(config)
    }

    /// Validate an already built configuration
    pub fn validate(config: &RelayConfig) -> Result<(), ContractError> {
        validator::validate(config)
    }

    /// Serialize RelayConfig to TOML string
    pub fn to_toml(config: &RelayConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize RelayConfig to JSON string
    pub fn to_json(config: &RelayConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    /// Embed colour to use: the configured one, or a random colour.
    pub fn resolve_embed_color(delivery: &DeliveryConfig) -> Result<u32, ContractError> {
        match delivery.parsed_color()? {
            Some(color) => Ok(color),
            None => Ok(rand::random_range(0..=0xFF_FF_FF)),
        }
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_TOML: &str = r#"
[webhook]
url = "https://discord.com/api/webhooks/123/abcdefgh"
thread_id = "42"

[delivery]
embed_color = "89a7d9"

[[sources]]
channel = "durov"

[[sources]]
channel = "https://t.me/telegram"
webhook_url = "https://discord.com/api/webhooks/456/zyxwvuts"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.webhook.thread_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&config).unwrap();
        let again = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(config.sources, again.sources);
        assert_eq!(config.webhook.url, again.webhook.url);
    }

    #[test]
    fn test_round_trip_json() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&config).unwrap();
        let again = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(config.sources, again.sources);
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(MINIMAL_TOML.as_bytes()).unwrap();

        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config.sources[0].channel, "durov");
    }

    #[test]
    fn test_unsupported_extension() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(b"sources: []").unwrap();

        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn test_env_only_configuration() {
        let overrides = ConfigOverrides {
            webhook_url: Some("https://discord.com/api/webhooks/1/token".into()),
            channels: vec!["alpha".into(), "beta".into()],
            ..Default::default()
        };
        let missing = Path::new("/nonexistent/relay.toml");
        let config = ConfigLoader::load_with_overrides(Some(missing), &overrides).unwrap();
        assert_eq!(config.sources.len(), 2);
    }

    #[test]
    fn test_validation_runs_after_overrides() {
        let overrides = ConfigOverrides {
            channels: vec!["alpha".into()],
            ..Default::default()
        };
        let err = ConfigLoader::load_with_overrides(None, &overrides).unwrap_err();
        assert!(err.to_string().contains("no webhook"));
    }

    #[test]
    fn test_resolve_embed_color() {
        let mut delivery = DeliveryConfig::default();
        delivery.embed_color = Some("#0000ff".into());
        assert_eq!(ConfigLoader::resolve_embed_color(&delivery).unwrap(), 0xff);

        delivery.embed_color = None;
        let random = ConfigLoader::resolve_embed_color(&delivery).unwrap();
        assert!(random <= 0xFF_FF_FF);
    }
}
