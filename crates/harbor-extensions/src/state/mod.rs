//! Per-extension state owned by one loaded extension.

pub mod alarms;
pub mod i18n;
pub mod menus;
pub mod net;
pub mod permissions;
pub mod storage;

use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use harbor_common::ExtensionId;
use tracing::warn;

use crate::manifest::{Manifest, RunAt};
use crate::match_pattern::ContentScriptGate;
use crate::services::DurableStore;
use crate::sync::lock;

pub use alarms::{Alarm, AlarmScheduler, AlarmSpec};
pub use i18n::Catalogs;
pub use menus::{ContextMenus, MenuItem, MenuNode, MenuProps};
pub use net::{NetDecision, NetRule, NetState, RequestFilter};
pub use permissions::{PermissionSnapshot, Permissions};
pub use storage::{AreaName, ExtensionStorage, KeySelector, StorageArea, StorageChanges};

/// A content script with its sources read from disk at load time.
#[derive(Debug, Clone)]
pub struct LoadedContentScript {
    pub gate: ContentScriptGate,
    pub run_at: RunAt,
    pub js: String,
    pub css: String,
}

pub struct ExtensionState {
    pub id: ExtensionId,
    pub manifest: Manifest,
    pub root: PathBuf,
    pub storage: ExtensionStorage,
    pub catalogs: Catalogs,
    pub content_scripts: Vec<LoadedContentScript>,
    permissions: Mutex<Permissions>,
    menus: Mutex<ContextMenus>,
    net: Mutex<NetState>,
}

/// Where `storage.local` lives and how large it may grow.
pub struct StorageBacking {
    pub store: Option<Arc<dyn DurableStore>>,
    pub quota_bytes: usize,
}

impl ExtensionState {
    pub fn new(id: ExtensionId, manifest: Manifest, root: PathBuf, backing: StorageBacking) -> Self {
        let local = match backing.store {
            Some(store) => StorageArea::durable(store, id.clone(), backing.quota_bytes),
            None => StorageArea::in_memory(AreaName::Local, backing.quota_bytes),
        };
        let storage = ExtensionStorage {
            local,
            session: StorageArea::in_memory(AreaName::Session, backing.quota_bytes),
        };
        let catalogs = Catalogs::load(&root, manifest.default_locale.as_deref());
        let content_scripts = load_content_scripts(&root, &manifest);
        let permissions = Permissions::from_manifest(&manifest);
        Self {
            id,
            manifest,
            root,
            storage,
            catalogs,
            content_scripts,
            permissions: Mutex::new(permissions),
            menus: Mutex::new(ContextMenus::default()),
            net: Mutex::new(NetState::default()),
        }
    }

    pub fn permissions(&self) -> MutexGuard<'_, Permissions> {
        lock(&self.permissions)
    }

    pub fn menus(&self) -> MutexGuard<'_, ContextMenus> {
        lock(&self.menus)
    }

    pub fn net(&self) -> MutexGuard<'_, NetState> {
        lock(&self.net)
    }

    /// Read a file shipped with the extension. Paths that would escape the
    /// extension root are refused.
    pub fn read_resource(&self, relative: &str) -> Option<String> {
        read_resource(&self.root, relative)
    }

    /// `chrome-extension://<id>/<path>`.
    pub fn resource_url(&self, path: &str) -> String {
        format!("chrome-extension://{}/{}", self.id, path.trim_start_matches('/'))
    }
}

fn read_resource(root: &Path, relative: &str) -> Option<String> {
    let relative = Path::new(relative.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        warn!(path = %relative.display(), "refusing resource path outside extension root");
        return None;
    }
    match std::fs::read_to_string(root.join(relative)) {
        Ok(source) => Some(source),
        Err(e) => {
            warn!(path = %relative.display(), error = %e, "extension resource unreadable");
            None
        }
    }
}

fn load_content_scripts(root: &Path, manifest: &Manifest) -> Vec<LoadedContentScript> {
    manifest
        .content_scripts
        .iter()
        .map(|spec| LoadedContentScript {
            gate: ContentScriptGate::new(&spec.matches, &spec.exclude_matches, spec.match_about_blank),
            run_at: spec.run_at,
            js: spec
                .js
                .iter()
                .filter_map(|file| read_resource(root, file))
                .collect::<Vec<_>>()
                .join("\n"),
            css: spec
                .css
                .iter()
                .filter_map(|file| read_resource(root, file))
                .collect::<Vec<_>>()
                .join("\n"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemoryStore;

    fn state_in(dir: &Path, manifest: &str) -> ExtensionState {
        ExtensionState::new(
            ExtensionId::from_path(dir),
            Manifest::parse(manifest).unwrap(),
            dir.to_path_buf(),
            StorageBacking {
                store: Some(Arc::new(MemoryStore::new())),
                quota_bytes: 1 << 20,
            },
        )
    }

    #[test]
    fn content_sources_are_read_at_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.js"), "console.log('a');").unwrap();
        std::fs::write(dir.path().join("b.css"), "body { color: red }").unwrap();
        let state = state_in(
            dir.path(),
            r#"{"manifest_version": 3, "name": "x", "version": "1",
                "content_scripts": [{"matches": ["https://*/*"], "js": ["a.js", "missing.js"], "css": ["b.css"]}]}"#,
        );
        let script = &state.content_scripts[0];
        assert_eq!(script.js, "console.log('a');");
        assert_eq!(script.css, "body { color: red }");
        assert!(script.gate.allows("https://x.test/", None));
    }

    #[test]
    fn resources_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.js"), "1").unwrap();
        let state = state_in(dir.path(), r#"{"manifest_version": 3, "name": "x", "version": "1"}"#);
        assert_eq!(state.read_resource("/ok.js").as_deref(), Some("1"));
        assert_eq!(state.read_resource("../etc/passwd"), None);
    }

    #[test]
    fn resource_url_form() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path(), r#"{"manifest_version": 2, "name": "x", "version": "1"}"#);
        assert_eq!(
            state.resource_url("/popup.html"),
            format!("chrome-extension://{}/popup.html", state.id)
        );
    }

    #[test]
    fn manifest_permissions_seed_the_grant_table() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(
            dir.path(),
            r#"{"manifest_version": 3, "name": "x", "version": "1", "permissions": ["storage"]}"#,
        );
        assert!(state.permissions().has("storage"));
        assert!(state.menus().items().is_empty());
        assert!(state.net().rules().is_empty());
    }
}
