//! Harbor configuration system.
//!
//! TOML-based configuration for the browser shell and its extension
//! runtime. Every section uses `serde(default)`, so a partial (or empty)
//! config file works out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use harbor_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{HarborConfig, LogLevel, CONFIG_SCHEMA_VERSION};

use harbor_common::ConfigError;

/// Load config from the platform default path and validate it.
///
/// Creates a commented default file when none exists.
pub fn load_config() -> Result<HarborConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &HarborConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
