//! Extension runtime and extension storage configuration.

use std::path::PathBuf;

use harbor_common::ConfigError;
use serde::{Deserialize, Serialize};

use crate::toml_loader::resolve_data_dir;

/// Where extensions are loaded from and how they are localized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionsConfig {
    /// Directory containing one sub-directory per unpacked extension.
    /// Empty means `<data_dir>/harbor/extensions`; `~/` is expanded.
    pub dir: String,
    pub enabled: bool,
    /// Locale used for `i18n.getMessage`, e.g. `en_US`. Empty means
    /// derive from `$LANG`.
    pub user_locale: String,
    /// Upper bound on extensions loaded in one pass (valid range: 1-512).
    pub max_extensions: u32,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            dir: String::new(),
            enabled: true,
            user_locale: String::new(),
            max_extensions: 64,
        }
    }
}

impl ExtensionsConfig {
    pub fn resolved_dir(&self) -> Result<PathBuf, ConfigError> {
        resolve_data_dir(&self.dir, "extensions")
    }

    /// `en_US.UTF-8` style values from the environment are trimmed to `en_US`.
    pub fn resolved_locale(&self) -> String {
        if !self.user_locale.is_empty() {
            return self.user_locale.clone();
        }
        std::env::var("LANG")
            .ok()
            .and_then(|lang| {
                let locale = lang.split('.').next().unwrap_or_default().to_string();
                (!locale.is_empty() && locale != "C" && locale != "POSIX").then_some(locale)
            })
            .unwrap_or_else(|| "en_US".to_string())
    }
}

/// Backing store for the `storage.local` area.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// When false, `storage.local` lives in memory only.
    pub persist_local: bool,
    /// Empty means `<data_dir>/harbor/extension-storage`; `~/` is expanded.
    pub dir: String,
    /// Per-area quota in KiB (valid range: 1-1048576).
    pub quota_kb: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            persist_local: true,
            dir: String::new(),
            quota_kb: 10 * 1024,
        }
    }
}

impl StorageConfig {
    pub fn resolved_dir(&self) -> Result<PathBuf, ConfigError> {
        resolve_data_dir(&self.dir, "extension-storage")
    }

    pub fn quota_bytes(&self) -> usize {
        self.quota_kb as usize * 1024
    }
}
