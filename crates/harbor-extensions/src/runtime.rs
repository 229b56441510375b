//! Per-extension call routing: envelope in, JSON value out.

use std::borrow::Cow;
use std::sync::Arc;

use harbor_common::{new_correlation_id, ContextId, ExtensionError, ExtensionId};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::HostContext;
use crate::bridge::{Call, HostMessage, ScriptContext};
use crate::manifest::Manifest;
use crate::profile::{ApiBundle, ManifestProfile};
use crate::shell::Shell;
use crate::state::{ExtensionState, MenuNode};

pub struct ExtensionRuntime {
    state: Arc<ExtensionState>,
    shell: Arc<Shell>,
    profile: ManifestProfile,
    apis: ApiBundle,
}

/// Map a call onto its dispatcher: `storage.local` + `get` is served by
/// the `storage` dispatcher as `local.get`.
fn route<'a>(api: &'a str, method: &'a str) -> (&'a str, Cow<'a, str>) {
    match api.split_once('.') {
        Some((namespace, area)) => (namespace, Cow::Owned(format!("{area}.{method}"))),
        None => (api, Cow::Borrowed(method)),
    }
}

impl ExtensionRuntime {
    pub fn new(state: Arc<ExtensionState>, shell: Arc<Shell>) -> Result<Self, ExtensionError> {
        let profile = ManifestProfile::for_version(state.manifest.manifest_version)?;
        Ok(Self {
            state,
            shell,
            profile,
            apis: profile.bundle(),
        })
    }

    pub fn id(&self) -> &ExtensionId {
        &self.state.id
    }

    pub fn manifest(&self) -> &Manifest {
        &self.state.manifest
    }

    pub fn profile(&self) -> ManifestProfile {
        self.profile
    }

    pub fn state(&self) -> &Arc<ExtensionState> {
        &self.state
    }

    pub fn namespaces(&self) -> Vec<&'static str> {
        self.apis.namespaces()
    }

    /// Run one call to completion. `origin` is `None` for calls made by
    /// the host itself.
    pub async fn handle(&self, call: Call, origin: Option<Arc<dyn ScriptContext>>) -> Value {
        let cid = new_correlation_id();
        let Call {
            api, method, params, ..
        } = call;
        let (namespace, method) = route(&api, &method);
        let Some(host) = self.apis.get(namespace) else {
            warn!(cid = %cid, extension = %self.state.id, profile = %self.profile, api = %api, "unknown api namespace");
            return Value::Null;
        };
        debug!(cid = %cid, extension = %self.state.id, api = namespace, method = %method, "call");

        let cx = HostContext {
            extension: Arc::clone(&self.state),
            shell: Arc::clone(&self.shell),
            origin,
        };
        let value = host.handle(&method, params, &cx).await;
        debug!(cid = %cid, null = value.is_null(), "call finished");
        value
    }

    /// Run a script-originated call in the background and post exactly one
    /// reply when the call carries a callback id.
    pub fn dispatch(self: &Arc<Self>, call: Call, origin: Arc<dyn ScriptContext>) -> JoinHandle<()> {
        let runtime = Arc::clone(self);
        tokio::spawn(async move {
            let reply_to = call.reply_id();
            let value = runtime.handle(call, Some(Arc::clone(&origin))).await;
            if let Some(callback_id) = reply_to {
                origin.post(HostMessage::reply(callback_id, value));
            }
        })
    }

    /// Register a popup or content-script context for messaging.
    pub fn attach_page(&self, context: &Arc<dyn ScriptContext>) {
        self.shell.messaging.register_page(&self.state.id, context);
    }

    pub fn detach(&self, context: ContextId) {
        self.shell.messaging.unregister(&self.state.id, context);
    }

    /// Context-menu items grouped for the native menu.
    pub fn menu_tree(&self) -> Vec<MenuNode> {
        self.state.menus().tree()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::RecordingContext;
    use crate::state::StorageBacking;
    use harbor_tabs::{Browser, HeadlessEngine};
    use serde_json::json;

    fn runtime(manifest: &str) -> Arc<ExtensionRuntime> {
        let tabs = Arc::new(Browser::new(Arc::new(HeadlessEngine::new()), true));
        let (shell, _events) = Shell::builder(tabs).build();
        let state = ExtensionState::new(
            ExtensionId::from("rt-ext"),
            Manifest::parse(manifest).unwrap(),
            std::env::temp_dir(),
            StorageBacking {
                store: None,
                quota_bytes: 1 << 20,
            },
        );
        Arc::new(ExtensionRuntime::new(Arc::new(state), shell).unwrap())
    }

    const MV3: &str = r#"{"manifest_version": 3, "name": "t", "version": "1"}"#;

    #[test]
    fn storage_areas_route_to_the_storage_dispatcher() {
        assert_eq!(route("storage.local", "get"), ("storage", Cow::Borrowed("local.get")));
        assert_eq!(route("tabs", "query"), ("tabs", Cow::Borrowed("query")));
    }

    #[tokio::test]
    async fn storage_round_trip_through_envelopes() {
        let rt = runtime(MV3);
        let set = Call::new("storage.local", "set", json!({"items": {"k": "v"}}));
        rt.handle(set, None).await;
        let get = Call::new("storage.local", "get", json!({"keys": ["k"]}));
        assert_eq!(rt.handle(get, None).await, json!({"k": "v"}));
    }

    #[tokio::test]
    async fn namespaces_outside_the_profile_are_null() {
        let rt = runtime(MV3);
        let call = Call::new("notifications", "create", json!({"options": {}}));
        assert_eq!(rt.handle(call, None).await, Value::Null);
    }

    #[tokio::test]
    async fn dispatch_replies_once_with_callback_id() {
        let rt = runtime(MV3);
        let page = Arc::new(RecordingContext::page(None));
        let call = Call::new("runtime", "getId", json!({})).with_callback(9);
        rt.dispatch(call, page.clone()).await.unwrap();
        assert_eq!(page.replies(), vec![(9, json!("rt-ext"))]);
    }

    #[tokio::test]
    async fn dispatch_without_callback_posts_nothing() {
        let rt = runtime(MV3);
        let page = Arc::new(RecordingContext::page(None));
        let call = Call::new("runtime", "getId", json!({})).with_callback(0);
        rt.dispatch(call, page.clone()).await.unwrap();
        assert!(page.messages().is_empty());
    }
}
