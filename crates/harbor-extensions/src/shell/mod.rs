//! Host services shared by every loaded extension.

mod descriptors;
pub mod notifications;
pub mod windows;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use harbor_config::HarborConfig;
use harbor_tabs::TabHost;
use tokio::sync::mpsc;

use crate::background::HostEvent;
use crate::identity::Identities;
use crate::messaging::MessagingCenter;
use crate::services::{AutoConsent, ConsentPrompt, DurableStore, LogNotifier, NotificationService};
use crate::state::AlarmScheduler;

pub use descriptors::{GroupDescriptor, TabDescriptor, WindowDescriptor, GROUP_COLORS, WINDOW_ID_NONE};
pub use notifications::{Delivery, NotificationCenter, NotificationOptions};
pub use windows::{WindowRecord, WindowRegistry, WINDOW_TYPE};

#[derive(Debug, Clone)]
pub struct ShellSettings {
    pub user_locale: String,
    pub new_tab_url: String,
    pub quota_bytes: usize,
    pub notifications_enabled: bool,
    pub max_extensions: usize,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self::from_config(&HarborConfig::default())
    }
}

impl ShellSettings {
    pub fn from_config(config: &HarborConfig) -> Self {
        Self {
            user_locale: config.extensions.resolved_locale(),
            new_tab_url: config.tabs.new_tab_url.clone(),
            quota_bytes: config.storage.quota_bytes(),
            notifications_enabled: config.notifications.enabled,
            max_extensions: config.extensions.max_extensions as usize,
        }
    }
}

pub struct Shell {
    pub tabs: Arc<dyn TabHost>,
    pub ids: Identities,
    pub windows: WindowRegistry,
    pub messaging: MessagingCenter,
    pub alarms: AlarmScheduler,
    pub notifications: NotificationCenter,
    pub consent: Arc<dyn ConsentPrompt>,
    /// Durable backing for `storage.local`; `None` keeps it in memory.
    pub store: Option<Arc<dyn DurableStore>>,
    pub settings: ShellSettings,
    groups_created: AtomicU64,
}

impl Shell {
    pub fn builder(tabs: Arc<dyn TabHost>) -> ShellBuilder {
        ShellBuilder::new(tabs)
    }

    /// Default title for the next new group. Numbers are never reused.
    pub fn next_group_title(&self) -> String {
        let n = self.groups_created.fetch_add(1, Ordering::Relaxed) + 1;
        format!("Group {n}")
    }
}

pub struct ShellBuilder {
    tabs: Arc<dyn TabHost>,
    consent: Arc<dyn ConsentPrompt>,
    notifier: Arc<dyn NotificationService>,
    store: Option<Arc<dyn DurableStore>>,
    settings: ShellSettings,
}

impl ShellBuilder {
    pub fn new(tabs: Arc<dyn TabHost>) -> Self {
        Self {
            tabs,
            consent: Arc::new(AutoConsent(false)),
            notifier: Arc::new(LogNotifier),
            store: None,
            settings: ShellSettings::default(),
        }
    }

    pub fn consent(mut self, consent: Arc<dyn ConsentPrompt>) -> Self {
        self.consent = consent;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationService>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn settings(mut self, settings: ShellSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build the shell plus the receiving end of its host-event channel,
    /// which the background host pumps.
    pub fn build(self) -> (Arc<Shell>, mpsc::UnboundedReceiver<HostEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let shell = Shell {
            tabs: self.tabs,
            ids: Identities::default(),
            windows: WindowRegistry::new(),
            messaging: MessagingCenter::new(),
            alarms: AlarmScheduler::new(events),
            notifications: NotificationCenter::new(self.notifier, self.settings.notifications_enabled),
            consent: self.consent,
            store: self.store,
            settings: self.settings,
            groups_created: AtomicU64::new(0),
        };
        (Arc::new(shell), receiver)
    }
}
