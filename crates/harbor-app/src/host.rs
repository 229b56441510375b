//! Wires the shell, background host and registry from config, with
//! script contexts that print their traffic to stdout.

use std::io::Write;
use std::sync::Arc;

use harbor_common::{ContextId, EventBus, TabHandle};
use harbor_config::HarborConfig;
use harbor_extensions::bridge::next_context_id;
use harbor_extensions::services::JsonFileStore;
use harbor_extensions::state::ExtensionState;
use harbor_extensions::{
    BackgroundHost, BackgroundLauncher, ContextRole, ExtensionRegistry, HostEvent, HostMessage,
    ScriptContext, Shell, ShellSettings,
};
use harbor_tabs::{Browser, HeadlessEngine};
use serde_json::json;
use tokio::sync::mpsc;

/// Writes every posted message as one JSON line.
pub struct StdoutContext {
    id: ContextId,
    role: ContextRole,
    tab: Option<TabHandle>,
    label: String,
}

impl StdoutContext {
    pub fn new(role: ContextRole, tab: Option<TabHandle>, label: impl Into<String>) -> Self {
        Self {
            id: next_context_id(),
            role,
            tab,
            label: label.into(),
        }
    }
}

impl ScriptContext for StdoutContext {
    fn id(&self) -> ContextId {
        self.id
    }

    fn role(&self) -> ContextRole {
        self.role
    }

    fn tab(&self) -> Option<TabHandle> {
        self.tab
    }

    fn post(&self, message: HostMessage) {
        let line = json!({ "context": self.label, "message": message });
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{line}") {
            tracing::warn!(error = %e, "stdout closed");
        }
    }
}

struct StdoutLauncher;

impl BackgroundLauncher for StdoutLauncher {
    fn launch(&self, extension: &ExtensionState) -> Option<Arc<dyn ScriptContext>> {
        Some(Arc::new(StdoutContext::new(
            ContextRole::Background,
            None,
            format!("background:{}", extension.id),
        )))
    }
}

pub struct Host {
    pub shell: Arc<Shell>,
    pub background: Arc<BackgroundHost>,
    pub registry: ExtensionRegistry,
    events: Option<mpsc::UnboundedReceiver<HostEvent>>,
}

impl Host {
    pub fn from_config(config: &HarborConfig) -> Self {
        let engine = Arc::new(HeadlessEngine::new());
        let browser = Arc::new(Browser::new(engine, config.tabs.lazy_background_tabs));
        let mut builder = Shell::builder(browser).settings(ShellSettings::from_config(config));
        if config.storage.persist_local {
            match config.storage.resolved_dir() {
                Ok(dir) => builder = builder.store(Arc::new(JsonFileStore::new(dir))),
                Err(e) => tracing::warn!(error = %e, "no storage directory, local storage is in-memory"),
            }
        }
        let (shell, events) = builder.build();
        let background = Arc::new(BackgroundHost::new(shell.clone(), Arc::new(StdoutLauncher)));
        let registry = ExtensionRegistry::new(shell.clone(), background.clone(), Arc::new(EventBus::default()));
        Self {
            shell,
            background,
            registry,
            events: Some(events),
        }
    }

    /// Start forwarding alarms into background contexts. Needs a runtime.
    pub fn start_pump(&mut self) {
        if let Some(events) = self.events.take() {
            tokio::spawn(Arc::clone(&self.background).pump(events));
        }
    }
}
