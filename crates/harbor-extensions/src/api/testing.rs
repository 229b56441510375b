//! Fixture shared by the dispatcher tests.

use std::sync::Arc;

use harbor_common::ExtensionId;
use harbor_tabs::{Browser, HeadlessEngine};
use tokio::sync::mpsc;

use super::HostContext;
use crate::background::HostEvent;
use crate::bridge::ScriptContext;
use crate::manifest::Manifest;
use crate::services::{AutoConsent, ConsentPrompt};
use crate::shell::Shell;
use crate::state::{ExtensionState, StorageBacking};

pub(crate) struct Fixture {
    pub cx: HostContext,
    pub engine: Arc<HeadlessEngine>,
    pub browser: Arc<Browser>,
    pub events: mpsc::UnboundedReceiver<HostEvent>,
}

impl Fixture {
    pub fn new(manifest: &str) -> Self {
        Self::with_consent(manifest, Arc::new(AutoConsent(false)))
    }

    pub fn with_consent(manifest: &str, consent: Arc<dyn ConsentPrompt>) -> Self {
        let engine = Arc::new(HeadlessEngine::new());
        let browser = Arc::new(Browser::new(engine.clone(), true));
        let (shell, events) = Shell::builder(browser.clone()).consent(consent).build();
        let extension = ExtensionState::new(
            ExtensionId::from("test-ext"),
            Manifest::parse(manifest).unwrap(),
            std::env::temp_dir(),
            StorageBacking {
                store: None,
                quota_bytes: 1 << 20,
            },
        );
        Self {
            cx: HostContext {
                extension: Arc::new(extension),
                shell,
                origin: None,
            },
            engine,
            browser,
            events,
        }
    }

    /// The same fixture seen from a given calling context.
    pub fn from(&self, origin: Arc<dyn ScriptContext>) -> HostContext {
        HostContext {
            origin: Some(origin),
            ..self.cx.clone()
        }
    }
}

pub(crate) const MV3: &str = r#"{"manifest_version": 3, "name": "t", "version": "1",
    "permissions": ["tabs", "storage", "alarms", "contextMenus"],
    "host_permissions": ["https://*.example.com/*"]}"#;
