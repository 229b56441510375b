//! Configuration schema types for Harbor.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod extensions;
mod shell;
mod system;

pub use extensions::*;
pub use shell::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Harbor.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HarborConfig {
    pub extensions: ExtensionsConfig,
    pub storage: StorageConfig,
    pub tabs: TabsConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}
