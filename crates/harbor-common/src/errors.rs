use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("path error: {0}")]
    PathError(String),

    #[error("notification error: {0}")]
    NotificationError(String),

    #[error("not supported: {0}")]
    NotSupported(String),
}

/// Failures while loading, persisting, or tearing down a single extension.
///
/// None of these ever reach script code: API calls degrade to `null`
/// replies instead. They surface only on host-facing entry points.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error("failed to read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest parse error: {0}")]
    ManifestParse(String),

    #[error("unsupported manifest version: {0}")]
    UnsupportedManifestVersion(u32),

    #[error("manifest is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("extension not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("extension limit of {0} reached")]
    LimitReached(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum HarborError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Extension(#[from] ExtensionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
