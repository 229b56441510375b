//! Background contexts: one per extension, started at load and fed host
//! events (alarms) from the shell's event channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use harbor_common::ExtensionId;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::bridge::{RecordingContext, ScriptContext};
use crate::shell::Shell;
use crate::state::{Alarm, ExtensionState};
use crate::sync::lock;

pub const ON_ALARM: &str = "alarms.onAlarm";
pub const ON_INSTALLED: &str = "runtime.onInstalled";
pub const ON_STARTUP: &str = "runtime.onStartup";

/// Work produced off the dispatch path that must reach an extension.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Alarm { extension: ExtensionId, alarm: Alarm },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartReason {
    Install,
    Startup,
}

/// Creates the script environment that runs an extension's background
/// scripts. The host UI layer owns what it returns.
pub trait BackgroundLauncher: Send + Sync {
    fn launch(&self, extension: &ExtensionState) -> Option<Arc<dyn ScriptContext>>;
}

/// Launches recording contexts, for the headless host and tests.
#[derive(Default)]
pub struct HeadlessLauncher;

impl BackgroundLauncher for HeadlessLauncher {
    fn launch(&self, extension: &ExtensionState) -> Option<Arc<dyn ScriptContext>> {
        let files = extension
            .manifest
            .background
            .as_ref()
            .map(|b| b.script_files().len())
            .unwrap_or(0);
        debug!(extension = %extension.id, files, "headless background launched");
        Some(Arc::new(RecordingContext::background()))
    }
}

pub struct BackgroundHost {
    shell: Arc<Shell>,
    launcher: Arc<dyn BackgroundLauncher>,
    contexts: Mutex<HashMap<ExtensionId, Arc<dyn ScriptContext>>>,
}

impl BackgroundHost {
    pub fn new(shell: Arc<Shell>, launcher: Arc<dyn BackgroundLauncher>) -> Self {
        Self {
            shell,
            launcher,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Launch and register the background context, if the manifest has
    /// one. Returns whether a context is running.
    pub fn start(&self, extension: &ExtensionState, reason: StartReason) -> bool {
        if extension.manifest.background.is_none() {
            return false;
        }
        let Some(context) = self.launcher.launch(extension) else {
            return false;
        };
        self.shell.messaging.register_background(&extension.id, &context);
        lock(&self.contexts).insert(extension.id.clone(), Arc::clone(&context));

        let (event, payload) = match reason {
            StartReason::Install => (ON_INSTALLED, json!({ "reason": "install" })),
            StartReason::Startup => (ON_STARTUP, json!({})),
        };
        self.shell.messaging.emit_to_background(&extension.id, event, payload);
        info!(extension = %extension.id, ?reason, "background started");
        true
    }

    pub fn stop(&self, extension: &ExtensionId) -> bool {
        let Some(context) = lock(&self.contexts).remove(extension) else {
            return false;
        };
        self.shell.messaging.unregister(extension, context.id());
        info!(extension = %extension, "background stopped");
        true
    }

    pub fn context(&self, extension: &ExtensionId) -> Option<Arc<dyn ScriptContext>> {
        lock(&self.contexts).get(extension).cloned()
    }

    pub fn deliver(&self, event: HostEvent) -> bool {
        match event {
            HostEvent::Alarm { extension, alarm } => {
                let payload = serde_json::to_value(&alarm).unwrap_or_default();
                self.shell.messaging.emit_to_background(&extension, ON_ALARM, payload)
            }
        }
    }

    /// Forward host events until the channel closes.
    pub async fn pump(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<HostEvent>) {
        while let Some(event) = events.recv().await {
            self.deliver(event);
        }
        debug!("host event channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use crate::state::StorageBacking;
    use harbor_tabs::{Browser, HeadlessEngine};

    fn extension(manifest: &str) -> ExtensionState {
        let dir = std::env::temp_dir();
        ExtensionState::new(
            ExtensionId::from("bg-ext"),
            Manifest::parse(manifest).unwrap(),
            dir,
            StorageBacking {
                store: None,
                quota_bytes: 1 << 20,
            },
        )
    }

    /// Launcher that hands out one context the test keeps hold of.
    struct FixedLauncher(Arc<RecordingContext>);

    impl BackgroundLauncher for FixedLauncher {
        fn launch(&self, _: &ExtensionState) -> Option<Arc<dyn ScriptContext>> {
            Some(self.0.clone())
        }
    }

    fn host() -> (BackgroundHost, Arc<RecordingContext>, mpsc::UnboundedReceiver<HostEvent>) {
        let tabs = Arc::new(Browser::new(Arc::new(HeadlessEngine::new()), true));
        let (shell, rx) = Shell::builder(tabs).build();
        let context = Arc::new(RecordingContext::background());
        let host = BackgroundHost::new(shell, Arc::new(FixedLauncher(context.clone())));
        (host, context, rx)
    }

    #[test]
    fn start_emits_installed() {
        let (host, context, _rx) = host();
        let ext = extension(
            r#"{"manifest_version": 3, "name": "x", "version": "1",
                "background": {"service_worker": "bg.js"}}"#,
        );
        assert!(host.start(&ext, StartReason::Install));
        assert_eq!(context.events(ON_INSTALLED), vec![json!({"reason": "install"})]);
        assert!(host.context(&ext.id).is_some());

        assert!(host.stop(&ext.id));
        assert!(!host.stop(&ext.id));
        assert!(host.context(&ext.id).is_none());
    }

    #[test]
    fn no_background_spec_means_no_context() {
        let (host, _context, _rx) = host();
        let ext = extension(r#"{"manifest_version": 3, "name": "x", "version": "1"}"#);
        assert!(!host.start(&ext, StartReason::Startup));
    }

    #[test]
    fn alarm_events_reach_the_background() {
        let (host, context, _rx) = host();
        let ext = extension(
            r#"{"manifest_version": 2, "name": "x", "version": "1",
                "background": {"scripts": ["bg.js"]}}"#,
        );
        host.start(&ext, StartReason::Startup);
        assert_eq!(context.events(ON_STARTUP).len(), 1);

        let delivered = host.deliver(HostEvent::Alarm {
            extension: ext.id.clone(),
            alarm: Alarm {
                name: "refresh".into(),
                scheduled_time: 1.0,
                period_in_minutes: None,
            },
        });
        assert!(delivered);
        assert_eq!(context.events(ON_ALARM)[0]["name"], "refresh");
    }

    #[tokio::test]
    async fn pump_drains_the_channel() {
        let (host, context, _rx) = host();
        let ext = extension(
            r#"{"manifest_version": 3, "name": "x", "version": "1",
                "background": {"service_worker": "bg.js"}}"#,
        );
        host.start(&ext, StartReason::Install);

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(HostEvent::Alarm {
            extension: ext.id.clone(),
            alarm: Alarm {
                name: "a".into(),
                scheduled_time: 0.0,
                period_in_minutes: Some(1.0),
            },
        })
        .unwrap();
        drop(tx);
        Arc::new(host).pump(rx).await;
        assert_eq!(context.events(ON_ALARM).len(), 1);
    }
}
