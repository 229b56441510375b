//! Where Harbor keeps its files on disk.

use std::path::{Path, PathBuf};

use harbor_common::ConfigError;

const APP_DIR: &str = "harbor";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Copy)]
enum Base {
    Config,
    Data,
}

impl Base {
    fn root(self) -> Result<PathBuf, ConfigError> {
        let (dir, label) = match self {
            Base::Config => (dirs::config_dir(), "config"),
            Base::Data => (dirs::data_dir(), "data"),
        };
        dir.map(|d| d.join(APP_DIR))
            .ok_or_else(|| ConfigError::ParseError(format!("could not determine {label} directory")))
    }
}

/// `~/.config/harbor/config.toml` on Linux.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(Base::Config.root()?.join(CONFIG_FILE))
}

/// A directory setting from the config file. Empty means
/// `<data_dir>/harbor/<leaf>`; a leading `~/` is the home directory.
pub fn resolve_data_dir(configured: &str, leaf: &str) -> Result<PathBuf, ConfigError> {
    let configured = configured.trim();
    if configured.is_empty() {
        return Ok(Base::Data.root()?.join(leaf));
    }
    Ok(expand_home(configured, dirs::home_dir().as_deref()))
}

fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path, home) {
        ("~", Some(home)) => home.to_path_buf(),
        (_, Some(home)) if path.starts_with("~/") => home.join(&path[2..]),
        _ => PathBuf::from(path),
    }
}
