//! The tab-host interface consumed by the extension runtime.
//!
//! The runtime never touches UI state directly; it goes through `TabHost`.
//! `Browser` is the in-process implementation over a locked `TabStrip`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use harbor_common::{FolderHandle, TabHandle};
use serde_json::Value;

use crate::engine::EngineFactory;
use crate::strip::TabStrip;

/// Point-in-time view of one tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSnapshot {
    pub handle: TabHandle,
    pub index: usize,
    pub url: String,
    pub title: String,
    pub pinned: bool,
    pub active: bool,
    pub loaded: bool,
    pub folder: Option<FolderHandle>,
}

/// Point-in-time view of one tab folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSnapshot {
    pub handle: FolderHandle,
    pub title: String,
    pub color: String,
    pub collapsed: bool,
    pub pinned: bool,
    pub tabs: Vec<TabHandle>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderUpdate {
    pub title: Option<String>,
    pub color: Option<String>,
    pub collapsed: Option<bool>,
    pub pinned: Option<bool>,
}

/// Tab and folder operations provided by the shell's UI layer.
pub trait TabHost: Send + Sync {
    /// All tabs in display order.
    fn tabs(&self) -> Vec<TabHandle>;
    fn tab(&self, tab: TabHandle) -> Option<TabSnapshot>;
    fn active_tab(&self) -> Option<TabHandle>;
    /// Open and select a tab; it starts loading immediately.
    fn new_tab(&self, url: &str) -> TabHandle;
    /// Open a tab without selecting it; loading may be deferred.
    fn new_background_tab(&self, url: &str) -> TabHandle;
    fn close(&self, tab: TabHandle) -> bool;
    fn select(&self, tab: TabHandle) -> bool;
    fn set_pinned(&self, tab: TabHandle, pinned: bool) -> bool;
    fn navigate(&self, tab: TabHandle, url: &str) -> bool;
    fn reload(&self, tab: TabHandle) -> bool;
    fn evaluate(&self, tab: TabHandle, script: &str) -> Option<Value>;

    fn folders(&self) -> Vec<FolderHandle>;
    fn folder(&self, folder: FolderHandle) -> Option<FolderSnapshot>;
    fn create_folder(&self, title: &str, color: &str) -> FolderHandle;
    fn update_folder(&self, folder: FolderHandle, update: FolderUpdate) -> bool;
    fn assign_folder(&self, tab: TabHandle, folder: Option<FolderHandle>) -> bool;
}

/// Single-window browser state shared between the UI and the runtime.
pub struct Browser {
    strip: Mutex<TabStrip>,
}

impl Browser {
    pub fn new(engines: Arc<dyn EngineFactory>, lazy_background: bool) -> Self {
        Self {
            strip: Mutex::new(TabStrip::new(engines, lazy_background)),
        }
    }

    fn strip(&self) -> MutexGuard<'_, TabStrip> {
        self.strip.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_title(&self, tab: TabHandle, title: &str) -> bool {
        self.strip().set_title(tab, title)
    }
}

impl TabHost for Browser {
    fn tabs(&self) -> Vec<TabHandle> {
        self.strip().handles()
    }

    fn tab(&self, tab: TabHandle) -> Option<TabSnapshot> {
        self.strip().snapshot(tab)
    }

    fn active_tab(&self) -> Option<TabHandle> {
        self.strip().active()
    }

    fn new_tab(&self, url: &str) -> TabHandle {
        self.strip().open(url, true)
    }

    fn new_background_tab(&self, url: &str) -> TabHandle {
        self.strip().open(url, false)
    }

    fn close(&self, tab: TabHandle) -> bool {
        self.strip().close(tab)
    }

    fn select(&self, tab: TabHandle) -> bool {
        self.strip().select(tab)
    }

    fn set_pinned(&self, tab: TabHandle, pinned: bool) -> bool {
        self.strip().set_pinned(tab, pinned)
    }

    fn navigate(&self, tab: TabHandle, url: &str) -> bool {
        self.strip().navigate(tab, url)
    }

    fn reload(&self, tab: TabHandle) -> bool {
        self.strip().reload(tab)
    }

    fn evaluate(&self, tab: TabHandle, script: &str) -> Option<Value> {
        self.strip().evaluate(tab, script)
    }

    fn folders(&self) -> Vec<FolderHandle> {
        self.strip().folder_handles()
    }

    fn folder(&self, folder: FolderHandle) -> Option<FolderSnapshot> {
        self.strip().folder(folder)
    }

    fn create_folder(&self, title: &str, color: &str) -> FolderHandle {
        self.strip().create_folder(title, color)
    }

    fn update_folder(&self, folder: FolderHandle, update: FolderUpdate) -> bool {
        self.strip().update_folder(folder, update)
    }

    fn assign_folder(&self, tab: TabHandle, folder: Option<FolderHandle>) -> bool {
        self.strip().assign(tab, folder)
    }
}
