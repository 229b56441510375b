//! Browser shell configuration: tabs and notifications.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TabsConfig {
    /// URL used by `tabs.create` / `windows.create` when none is given.
    pub new_tab_url: String,
    /// Background tabs defer engine load until first selected.
    pub lazy_background_tabs: bool,
}

impl Default for TabsConfig {
    fn default() -> Self {
        Self {
            new_tab_url: "about:blank".into(),
            lazy_background_tabs: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// When false, `notifications.create` still answers with an id but
    /// nothing is shown.
    pub enabled: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
