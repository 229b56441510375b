//! Reading `config.toml`, and writing the commented default on first run.

mod paths;
mod template;

#[cfg(test)]
mod tests;

use std::io::ErrorKind;
use std::path::Path;

use harbor_common::ConfigError;
use tracing::{info, warn};

use crate::schema::HarborConfig;

pub use paths::{default_config_path, resolve_data_dir};

/// Parse one config file. Missing fields take serde defaults; callers
/// decide whether to validate.
pub fn load_from_path(path: &Path) -> Result<HarborConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConfigError::FileNotFound(path.to_path_buf()),
        _ => ConfigError::ParseError(format!("failed to read {}: {e}", path.display())),
    })?;
    let config = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;
    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load the default config file, writing the commented template when there
/// is none. A template that cannot be written only costs a warning.
pub fn load_default() -> Result<HarborConfig, ConfigError> {
    let path = default_config_path()?;
    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            match create_default_config(&path) {
                Ok(()) => info!("created default config at {}", path.display()),
                Err(e) => warn!("running with built-in defaults: {e}"),
            }
            Ok(HarborConfig::default())
        }
        other => other,
    }
}

/// Write the commented template, creating parent directories.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let write_err = |what: &str, at: &Path, e: std::io::Error| {
        ConfigError::ParseError(format!("failed to {what} {}: {e}", at.display()))
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| write_err("create", parent, e))?;
    }
    std::fs::write(path, template::default_config_toml()).map_err(|e| write_err("write", path, e))
}
