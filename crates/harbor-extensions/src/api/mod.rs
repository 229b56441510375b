//! API namespaces exposed to script contexts.
//!
//! Every dispatcher answers with a JSON value. Malformed params, unknown
//! methods and references to objects that no longer exist all come back
//! as `null` (or an empty list) and a log line, never as an error.

pub mod alarms;
pub mod groups;
pub mod i18n;
pub mod menus;
pub mod network;
pub mod notifications;
pub mod permissions;
pub mod runtime;
pub mod scripting;
pub mod storage;
pub mod tabs;
pub mod windows;

use std::sync::Arc;

use async_trait::async_trait;
use harbor_tabs::TabSnapshot;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::bridge::ScriptContext;
use crate::shell::Shell;
use crate::state::ExtensionState;

/// Everything a dispatcher may touch for one call.
#[derive(Clone)]
pub struct HostContext {
    pub extension: Arc<ExtensionState>,
    pub shell: Arc<Shell>,
    /// The calling script context; `None` for host-originated calls.
    pub origin: Option<Arc<dyn ScriptContext>>,
}

impl HostContext {
    /// Tab hosting the calling context, if it is still open.
    pub fn origin_tab(&self) -> Option<TabSnapshot> {
        let tab = self.origin.as_ref()?.tab()?;
        self.shell.tabs.tab(tab)
    }

    /// The tab addressed by `tab_id`, or the active tab when absent.
    pub fn tab_or_active(&self, tab_id: Option<i64>) -> Option<TabSnapshot> {
        match tab_id {
            Some(id) => self.shell.resolve_tab(id),
            None => {
                let active = self.shell.tabs.active_tab()?;
                self.shell.tabs.tab(active)
            }
        }
    }

    /// Host-permission check for script injection into a tab.
    pub fn can_script(&self, tab: &TabSnapshot) -> bool {
        self.extension.permissions().allows_url(&tab.url, tab.active)
    }

    /// `MessageSender` describing the calling context.
    pub fn sender(&self) -> Value {
        let mut sender = json!({ "id": self.extension.id.as_str() });
        if let Some(origin) = &self.origin {
            if let Some(url) = origin.url() {
                sender["url"] = json!(url);
            }
        }
        if let Some(tab) = self.origin_tab() {
            sender["tab"] = to_value(self.shell.tab_descriptor(&tab));
        }
        sender
    }
}

#[async_trait]
pub trait ApiHost: Send + Sync {
    /// Namespace the dispatcher is bound under, e.g. `"tabs"`.
    fn namespace(&self) -> &'static str;

    async fn handle(&self, method: &str, params: Value, cx: &HostContext) -> Value;
}

/// Decode typed params, logging and yielding `None` on a shape mismatch.
pub(crate) fn parse<T: DeserializeOwned>(api: &str, method: &str, params: Value) -> Option<T> {
    match serde_json::from_value(params) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(api, method, error = %e, "malformed call params");
            None
        }
    }
}

pub(crate) fn unknown_method(api: &str, method: &str) -> Value {
    warn!(api, method, "unknown api method");
    Value::Null
}

pub(crate) fn to_value<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// A param that scripts may pass as one item or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// Accepts `{tabId}` or `{tabIds}` in either form.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct TabTargets {
    tab_id: Option<i64>,
    tab_ids: Option<OneOrMany<i64>>,
}

impl TabTargets {
    pub(crate) fn ids(self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.tab_id.into_iter().collect();
        ids.extend(self.tab_ids.map(OneOrMany::into_vec).unwrap_or_default());
        ids
    }
}

#[cfg(test)]
pub(crate) mod testing;
