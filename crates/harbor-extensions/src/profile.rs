//! Which API namespaces an extension sees, keyed on its manifest version.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use harbor_common::ExtensionError;

use crate::api::alarms::AlarmsApi;
use crate::api::groups::TabGroupsApi;
use crate::api::i18n::I18nApi;
use crate::api::menus::ContextMenusApi;
use crate::api::network::{DeclarativeNetRequestApi, WebRequestApi};
use crate::api::notifications::NotificationsApi;
use crate::api::permissions::PermissionsApi;
use crate::api::runtime::RuntimeApi;
use crate::api::scripting::ScriptingApi;
use crate::api::storage::StorageApi;
use crate::api::tabs::TabsApi;
use crate::api::windows::WindowsApi;
use crate::api::ApiHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestProfile {
    V2,
    V3,
}

impl ManifestProfile {
    pub fn for_version(manifest_version: u32) -> Result<Self, ExtensionError> {
        match manifest_version {
            2 => Ok(ManifestProfile::V2),
            3 => Ok(ManifestProfile::V3),
            other => Err(ExtensionError::UnsupportedManifestVersion(other)),
        }
    }

    /// Dispatchers available under this profile.
    pub fn bundle(self) -> ApiBundle {
        let common = ApiBundle::builder()
            .with(TabsApi)
            .with(TabGroupsApi)
            .with(WindowsApi)
            .with(StorageApi)
            .with(AlarmsApi)
            .with(PermissionsApi)
            .with(ScriptingApi)
            .with(ContextMenusApi)
            .with(I18nApi)
            .with(RuntimeApi);
        match self {
            ManifestProfile::V2 => common.with(WebRequestApi).with(NotificationsApi).build(),
            ManifestProfile::V3 => common.with(DeclarativeNetRequestApi).build(),
        }
    }
}

impl fmt::Display for ManifestProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestProfile::V2 => f.write_str("mv2"),
            ManifestProfile::V3 => f.write_str("mv3"),
        }
    }
}

/// Namespace → dispatcher table, built once per loaded extension.
pub struct ApiBundle {
    hosts: HashMap<&'static str, Arc<dyn ApiHost>>,
}

impl ApiBundle {
    pub fn builder() -> ApiBundleBuilder {
        ApiBundleBuilder::default()
    }

    pub fn get(&self, namespace: &str) -> Option<Arc<dyn ApiHost>> {
        self.hosts.get(namespace).cloned()
    }

    /// Namespace names, sorted.
    pub fn namespaces(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.hosts.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[derive(Default)]
pub struct ApiBundleBuilder {
    hosts: HashMap<&'static str, Arc<dyn ApiHost>>,
}

impl ApiBundleBuilder {
    pub fn with(mut self, host: impl ApiHost + 'static) -> Self {
        self.hosts.insert(host.namespace(), Arc::new(host));
        self
    }

    pub fn build(self) -> ApiBundle {
        ApiBundle { hosts: self.hosts }
    }
}
