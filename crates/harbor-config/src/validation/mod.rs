//! Full configuration validation.
//!
//! Checks numeric ranges and required strings, collecting every problem
//! into a single `ConfigError`.

mod helpers;

#[cfg(test)]
mod tests;

use crate::schema::HarborConfig;
use harbor_common::ConfigError;

use helpers::{validate_non_empty, validate_range};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &HarborConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_range(
        &mut errors,
        "extensions.max_extensions",
        config.extensions.max_extensions,
        1,
        512,
    );
    validate_range(
        &mut errors,
        "storage.quota_kb",
        config.storage.quota_kb,
        1,
        1024 * 1024,
    );
    validate_non_empty(&mut errors, "tabs.new_tab_url", &config.tabs.new_tab_url);

    if !config.extensions.user_locale.is_empty()
        && !config
            .extensions
            .user_locale
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        errors.push(format!(
            "extensions.user_locale = {:?} is not a locale tag",
            config.extensions.user_locale
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
