//! Loaded extensions and the host hooks that fan out to them.
//!
//! Loading is isolated per extension: a broken manifest is logged,
//! published as `ExtensionFailed`, and never stops its siblings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use harbor_common::{Event, EventBus, ExtensionError, ExtensionId, TabHandle};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::api::menus::ON_CLICKED as MENU_CLICKED;
use crate::api::network::ON_BEFORE_REQUEST;
use crate::api::notifications::{ON_CLICKED as NOTIFICATION_CLICKED, ON_CLOSED as NOTIFICATION_CLOSED};
use crate::api::scripting::css_injection;
use crate::background::{BackgroundHost, StartReason};
use crate::bridge::content_script_prelude;
use crate::manifest::{Manifest, RunAt};
use crate::profile::ManifestProfile;
use crate::runtime::ExtensionRuntime;
use crate::shell::Shell;
use crate::state::{ExtensionState, NetDecision, StorageBacking};
use crate::sync::lock;

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded {
        id: ExtensionId,
        name: String,
        version: String,
        profile: ManifestProfile,
    },
    Failed {
        path: PathBuf,
        error: String,
    },
}

/// How the OS reported a notification interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationActivation {
    Clicked,
    Closed { by_user: bool },
}

pub struct ExtensionRegistry {
    shell: Arc<Shell>,
    background: Arc<BackgroundHost>,
    events: Arc<EventBus>,
    extensions: Mutex<BTreeMap<ExtensionId, Arc<ExtensionRuntime>>>,
}

impl ExtensionRegistry {
    pub fn new(shell: Arc<Shell>, background: Arc<BackgroundHost>, events: Arc<EventBus>) -> Self {
        Self {
            shell,
            background,
            events,
            extensions: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn shell(&self) -> &Arc<Shell> {
        &self.shell
    }

    /// Load every subdirectory of `dir`, in name order.
    pub fn load_dir(&self, dir: &Path) -> Vec<LoadOutcome> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "extensions directory unreadable");
                return Vec::new();
            }
        };
        let mut roots: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        roots.sort();

        let outcomes: Vec<LoadOutcome> = roots
            .iter()
            .map(|root| match self.load_with(root, StartReason::Startup) {
                Ok(runtime) => LoadOutcome::Loaded {
                    id: runtime.id().clone(),
                    name: runtime.manifest().name.clone(),
                    version: runtime.manifest().version.clone(),
                    profile: runtime.profile(),
                },
                Err(error) => LoadOutcome::Failed {
                    path: root.clone(),
                    error: error.to_string(),
                },
            })
            .collect();
        info!(
            dir = %dir.display(),
            loaded = outcomes.iter().filter(|o| matches!(o, LoadOutcome::Loaded { .. })).count(),
            total = outcomes.len(),
            "extensions directory scanned"
        );
        outcomes
    }

    /// Load (or reload) the unpacked extension at `path`.
    pub fn load(&self, path: &Path) -> Result<Arc<ExtensionRuntime>, ExtensionError> {
        self.load_with(path, StartReason::Install)
    }

    fn load_with(&self, path: &Path, reason: StartReason) -> Result<Arc<ExtensionRuntime>, ExtensionError> {
        let result = self.try_load(path, reason);
        if let Err(e) = &result {
            warn!(path = %path.display(), error = %e, "extension failed to load");
            self.events.publish(Event::ExtensionFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            });
        }
        result
    }

    fn try_load(&self, path: &Path, reason: StartReason) -> Result<Arc<ExtensionRuntime>, ExtensionError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let manifest = Manifest::from_dir(&root)?;
        let id = ExtensionId::from_path(&root);

        if self.get(&id).is_some() {
            debug!(extension = %id, "reloading extension");
            self.remove(&id);
        }
        let limit = self.shell.settings.max_extensions;
        if lock(&self.extensions).len() >= limit {
            return Err(ExtensionError::LimitReached(limit));
        }

        let state = ExtensionState::new(
            id.clone(),
            manifest,
            root,
            StorageBacking {
                store: self.shell.store.clone(),
                quota_bytes: self.shell.settings.quota_bytes,
            },
        );
        let runtime = Arc::new(ExtensionRuntime::new(Arc::new(state), Arc::clone(&self.shell))?);
        lock(&self.extensions).insert(id.clone(), Arc::clone(&runtime));

        let background = self.background.start(runtime.state(), reason);
        let name = runtime.manifest().name.clone();
        info!(
            extension = %id,
            name = %name,
            profile = %runtime.profile(),
            background,
            content_scripts = runtime.state().content_scripts.len(),
            "extension loaded"
        );
        self.events.publish(Event::ExtensionLoaded { id, name });
        Ok(runtime)
    }

    /// Unload an extension and release everything the shell holds for it.
    pub fn remove(&self, id: &ExtensionId) -> bool {
        let Some(runtime) = lock(&self.extensions).remove(id) else {
            return false;
        };
        self.background.stop(id);
        self.shell.messaging.remove_extension(id);
        let alarms = self.shell.alarms.clear_all(id);
        self.shell.notifications.forget_extension(id);
        for window in self.shell.windows.remove_owned(id) {
            self.shell.ids.windows.forget(window.handle);
        }
        info!(extension = %id, name = %runtime.manifest().name, alarms, "extension removed");
        self.events.publish(Event::ExtensionRemoved(id.clone()));
        true
    }

    pub fn get(&self, id: &ExtensionId) -> Option<Arc<ExtensionRuntime>> {
        lock(&self.extensions).get(id).cloned()
    }

    /// Loaded runtimes in id order.
    pub fn runtimes(&self) -> Vec<Arc<ExtensionRuntime>> {
        lock(&self.extensions).values().cloned().collect()
    }

    /// Inject the matching content scripts of every extension into a
    /// page that reached `run_at`. Returns how many extensions injected.
    pub fn inject_content_scripts(
        &self,
        tab: TabHandle,
        url: &str,
        referrer: Option<&str>,
        run_at: RunAt,
    ) -> usize {
        let mut injected = 0;
        for runtime in self.runtimes() {
            let state = runtime.state();
            let matching: Vec<_> = state
                .content_scripts
                .iter()
                .filter(|cs| cs.run_at == run_at && cs.gate.allows(url, referrer))
                .collect();
            if matching.is_empty() {
                continue;
            }

            let mut script = content_script_prelude(&state.id);
            for cs in &matching {
                if !cs.css.is_empty() {
                    script.push_str(&css_injection(&cs.css));
                    script.push('\n');
                }
                script.push_str(&cs.js);
                script.push('\n');
            }
            self.shell.tabs.evaluate(tab, &script);
            debug!(extension = %state.id, tab = %tab, url, scripts = matching.len(), "content scripts injected");
            injected += 1;
        }
        injected
    }

    /// Tell observing MV2 backgrounds about a request. Returns how many
    /// extensions were notified.
    pub fn observe_request(&self, url: &str, resource_type: &str) -> usize {
        let payload = json!({ "url": url, "type": resource_type });
        self.runtimes()
            .iter()
            .filter(|rt| {
                let state = rt.state();
                let observes = state.net().observes(url, resource_type);
                observes && state.permissions().allows_url(url, false)
            })
            .filter(|rt| {
                self.shell
                    .messaging
                    .emit_to_background(rt.id(), ON_BEFORE_REQUEST, payload.clone())
            })
            .count()
    }

    /// Combined declarative-rule verdict. A block or redirect from any
    /// extension beats an allow.
    pub fn evaluate_request(&self, url: &str, resource_type: &str) -> Option<NetDecision> {
        let decisions: Vec<NetDecision> = self
            .runtimes()
            .iter()
            .filter_map(|rt| rt.state().net().evaluate(url, resource_type))
            .collect();
        decisions
            .iter()
            .find(|d| **d != NetDecision::Allow)
            .or_else(|| decisions.first())
            .cloned()
    }

    /// Route an OS notification interaction back to its extension.
    pub fn notification_activated(&self, delivery_id: &str, activation: NotificationActivation) -> bool {
        let center = &self.shell.notifications;
        let delivery = match activation {
            NotificationActivation::Clicked => center.resolve(delivery_id),
            NotificationActivation::Closed { .. } => center.take(delivery_id),
        };
        let Some(delivery) = delivery else {
            debug!(delivery_id, "activation for unknown notification");
            return false;
        };
        let (name, payload) = match activation {
            NotificationActivation::Clicked => (NOTIFICATION_CLICKED, json!(delivery.logical_id)),
            NotificationActivation::Closed { by_user } => (
                NOTIFICATION_CLOSED,
                json!({ "notificationId": delivery.logical_id, "byUser": by_user }),
            ),
        };
        self.shell
            .messaging
            .emit_to_background(&delivery.extension, name, payload)
    }

    /// A native context-menu item was chosen.
    pub fn menu_clicked(
        &self,
        extension: &ExtensionId,
        item_id: &str,
        page_url: &str,
        tab: Option<TabHandle>,
    ) -> bool {
        let Some(runtime) = self.get(extension) else {
            return false;
        };
        let Some(item) = runtime.state().menus().get(item_id).cloned() else {
            warn!(extension = %extension, item = item_id, "click on unknown menu item");
            return false;
        };
        let mut info = json!({ "menuItemId": item.id, "pageUrl": page_url });
        if let Some(parent) = item.parent_id {
            info["parentMenuItemId"] = json!(parent);
        }
        if let Some(checked) = item.checked {
            info["checked"] = json!(checked);
        }
        let tab = tab
            .and_then(|t| self.shell.tabs.tab(t))
            .map(|t| serde_json::to_value(self.shell.tab_descriptor(&t)).unwrap_or_default())
            .unwrap_or(Value::Null);
        self.shell
            .messaging
            .emit_to_background(extension, MENU_CLICKED, json!({ "info": info, "tab": tab }))
    }
}
