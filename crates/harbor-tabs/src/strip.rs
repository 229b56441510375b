//! Ordered tab collection with selection, pinning, lazy loading, and folders.

use std::sync::Arc;

use harbor_common::{FolderHandle, TabHandle};
use serde_json::Value;
use tracing::debug;

use crate::engine::{EngineFactory, EngineView};
use crate::host::{FolderSnapshot, FolderUpdate, TabSnapshot};

struct TabEntry {
    handle: TabHandle,
    url: String,
    title: String,
    pinned: bool,
    /// False until the engine has been asked to load `url`.
    loaded: bool,
    folder: Option<FolderHandle>,
    view: Box<dyn EngineView>,
}

struct Folder {
    handle: FolderHandle,
    title: String,
    color: String,
    collapsed: bool,
    pinned: bool,
}

/// The tabs of one browser window, in display order. At most one tab is
/// active; a strip may be empty, in which case nothing is active.
pub struct TabStrip {
    tabs: Vec<TabEntry>,
    active: Option<TabHandle>,
    folders: Vec<Folder>,
    next_handle: u64,
    lazy_background: bool,
    engines: Arc<dyn EngineFactory>,
}

impl TabStrip {
    pub fn new(engines: Arc<dyn EngineFactory>, lazy_background: bool) -> Self {
        Self {
            tabs: Vec::new(),
            active: None,
            folders: Vec::new(),
            next_handle: 1,
            lazy_background,
            engines,
        }
    }

    fn allocate(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn position(&self, tab: TabHandle) -> Option<usize> {
        self.tabs.iter().position(|t| t.handle == tab)
    }

    fn entry_mut(&mut self, tab: TabHandle) -> Option<&mut TabEntry> {
        self.tabs.iter_mut().find(|t| t.handle == tab)
    }

    /// Append a tab. Active tabs are selected and loaded immediately;
    /// background tabs defer loading until first selected.
    pub fn open(&mut self, url: &str, active: bool) -> TabHandle {
        let handle = TabHandle(self.allocate());
        let view = self.engines.create_view(handle);
        self.tabs.push(TabEntry {
            handle,
            url: url.to_string(),
            title: url.to_string(),
            pinned: false,
            loaded: false,
            folder: None,
            view,
        });
        if active {
            self.select(handle);
        } else if !self.lazy_background {
            self.ensure_loaded(handle);
        }
        debug!(tab = %handle, url, active, "tab opened");
        handle
    }

    /// Remove a tab. Closing the active tab selects the first remaining tab.
    pub fn close(&mut self, tab: TabHandle) -> bool {
        let Some(idx) = self.position(tab) else {
            return false;
        };
        let removed = self.tabs.remove(idx);
        if self.active == Some(tab) {
            self.active = None;
            if let Some(first) = self.tabs.first().map(|t| t.handle) {
                self.select(first);
            }
        }
        if let Some(folder) = removed.folder {
            self.prune_folder(folder);
        }
        debug!(tab = %tab, "tab closed");
        true
    }

    pub fn select(&mut self, tab: TabHandle) -> bool {
        if self.position(tab).is_none() {
            return false;
        }
        self.active = Some(tab);
        self.ensure_loaded(tab);
        true
    }

    /// Pinning loads the tab eagerly.
    pub fn set_pinned(&mut self, tab: TabHandle, pinned: bool) -> bool {
        let Some(entry) = self.entry_mut(tab) else {
            return false;
        };
        entry.pinned = pinned;
        if pinned {
            self.ensure_loaded(tab);
        }
        true
    }

    pub fn navigate(&mut self, tab: TabHandle, url: &str) -> bool {
        let Some(entry) = self.entry_mut(tab) else {
            return false;
        };
        entry.url = url.to_string();
        entry.title = url.to_string();
        if entry.loaded {
            entry.view.load(url);
        }
        true
    }

    pub fn set_title(&mut self, tab: TabHandle, title: &str) -> bool {
        let Some(entry) = self.entry_mut(tab) else {
            return false;
        };
        entry.title = title.to_string();
        true
    }

    pub fn reload(&mut self, tab: TabHandle) -> bool {
        let Some(entry) = self.entry_mut(tab) else {
            return false;
        };
        if entry.loaded {
            entry.view.reload();
        } else {
            self.ensure_loaded(tab);
        }
        true
    }

    /// Evaluating a script in an unloaded tab loads it first.
    pub fn evaluate(&mut self, tab: TabHandle, script: &str) -> Option<Value> {
        self.ensure_loaded(tab);
        self.entry_mut(tab)?.view.evaluate_script(script)
    }

    fn ensure_loaded(&mut self, tab: TabHandle) {
        if let Some(entry) = self.entry_mut(tab) {
            if !entry.loaded {
                entry.loaded = true;
                let url = entry.url.clone();
                entry.view.load(&url);
            }
        }
    }

    pub fn active(&self) -> Option<TabHandle> {
        self.active
    }

    pub fn handles(&self) -> Vec<TabHandle> {
        self.tabs.iter().map(|t| t.handle).collect()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn snapshot(&self, tab: TabHandle) -> Option<TabSnapshot> {
        let index = self.position(tab)?;
        let entry = &self.tabs[index];
        Some(TabSnapshot {
            handle: entry.handle,
            index,
            url: entry.url.clone(),
            title: entry.title.clone(),
            pinned: entry.pinned,
            active: self.active == Some(entry.handle),
            loaded: entry.loaded,
            folder: entry.folder,
        })
    }

    // -- folders -------------------------------------------------------------

    pub fn create_folder(&mut self, title: &str, color: &str) -> FolderHandle {
        let handle = FolderHandle(self.allocate());
        self.folders.push(Folder {
            handle,
            title: title.to_string(),
            color: color.to_string(),
            collapsed: false,
            pinned: false,
        });
        handle
    }

    pub fn update_folder(&mut self, folder: FolderHandle, update: FolderUpdate) -> bool {
        let Some(entry) = self.folders.iter_mut().find(|f| f.handle == folder) else {
            return false;
        };
        if let Some(title) = update.title {
            entry.title = title;
        }
        if let Some(color) = update.color {
            entry.color = color;
        }
        if let Some(collapsed) = update.collapsed {
            entry.collapsed = collapsed;
        }
        if let Some(pinned) = update.pinned {
            entry.pinned = pinned;
        }
        true
    }

    /// Move a tab into a folder, or out of any folder with `None`.
    /// A folder left without tabs is removed.
    pub fn assign(&mut self, tab: TabHandle, folder: Option<FolderHandle>) -> bool {
        if let Some(f) = folder {
            if !self.folders.iter().any(|existing| existing.handle == f) {
                return false;
            }
        }
        let Some(entry) = self.entry_mut(tab) else {
            return false;
        };
        let previous = std::mem::replace(&mut entry.folder, folder);
        if let Some(prev) = previous.filter(|p| Some(*p) != folder) {
            self.prune_folder(prev);
        }
        true
    }

    fn prune_folder(&mut self, folder: FolderHandle) {
        if !self.tabs.iter().any(|t| t.folder == Some(folder)) {
            self.folders.retain(|f| f.handle != folder);
            debug!(folder = %folder, "empty folder removed");
        }
    }

    pub fn folder_handles(&self) -> Vec<FolderHandle> {
        self.folders.iter().map(|f| f.handle).collect()
    }

    pub fn folder(&self, folder: FolderHandle) -> Option<FolderSnapshot> {
        let entry = self.folders.iter().find(|f| f.handle == folder)?;
        Some(FolderSnapshot {
            handle: entry.handle,
            title: entry.title.clone(),
            color: entry.color.clone(),
            collapsed: entry.collapsed,
            pinned: entry.pinned,
            tabs: self
                .tabs
                .iter()
                .filter(|t| t.folder == Some(folder))
                .map(|t| t.handle)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HeadlessEngine;

    fn strip() -> (TabStrip, HeadlessEngine) {
        let engine = HeadlessEngine::new();
        (TabStrip::new(Arc::new(engine.clone()), true), engine)
    }

    #[test]
    fn new_strip_is_empty() {
        let (strip, _) = strip();
        assert!(strip.is_empty());
        assert_eq!(strip.active(), None);
    }

    #[test]
    fn active_open_selects_and_loads() {
        let (mut strip, engine) = strip();
        let tab = strip.open("https://a.example", true);
        assert_eq!(strip.active(), Some(tab));
        assert!(strip.snapshot(tab).unwrap().loaded);
        assert_eq!(engine.loads_for(tab), vec!["https://a.example"]);
    }

    #[test]
    fn background_open_defers_load_until_selected() {
        let (mut strip, engine) = strip();
        let first = strip.open("https://a.example", true);
        let bg = strip.open("https://b.example", false);

        assert_eq!(strip.active(), Some(first));
        assert!(!strip.snapshot(bg).unwrap().loaded);
        assert!(engine.loads_for(bg).is_empty());

        strip.select(bg);
        assert!(strip.snapshot(bg).unwrap().loaded);
        assert_eq!(engine.loads_for(bg), vec!["https://b.example"]);
    }

    #[test]
    fn eager_background_when_not_lazy() {
        let engine = HeadlessEngine::new();
        let mut strip = TabStrip::new(Arc::new(engine.clone()), false);
        let bg = strip.open("https://b.example", false);
        assert!(strip.snapshot(bg).unwrap().loaded);
        assert_eq!(strip.active(), None);
    }

    #[test]
    fn pinning_loads_eagerly() {
        let (mut strip, engine) = strip();
        let bg = strip.open("https://b.example", false);
        strip.set_pinned(bg, true);
        let snap = strip.snapshot(bg).unwrap();
        assert!(snap.pinned);
        assert!(snap.loaded);
        assert_eq!(engine.loads_for(bg).len(), 1);
    }

    #[test]
    fn closing_active_selects_first_remaining() {
        let (mut strip, _) = strip();
        let a = strip.open("https://a.example", false);
        let b = strip.open("https://b.example", false);
        let c = strip.open("https://c.example", true);

        assert!(strip.close(c));
        assert_eq!(strip.active(), Some(a));
        assert!(strip.snapshot(a).unwrap().loaded);

        assert!(strip.close(a));
        assert_eq!(strip.active(), Some(b));

        assert!(strip.close(b));
        assert_eq!(strip.active(), None);
        assert!(!strip.close(b));
    }

    #[test]
    fn closing_background_keeps_active() {
        let (mut strip, _) = strip();
        let a = strip.open("https://a.example", true);
        let b = strip.open("https://b.example", false);
        strip.close(b);
        assert_eq!(strip.active(), Some(a));
    }

    #[test]
    fn navigate_unloaded_tab_only_records_url() {
        let (mut strip, engine) = strip();
        let bg = strip.open("https://b.example", false);
        strip.navigate(bg, "https://c.example");
        assert!(engine.loads_for(bg).is_empty());
        strip.select(bg);
        assert_eq!(engine.loads_for(bg), vec!["https://c.example"]);
    }

    #[test]
    fn snapshot_reports_index() {
        let (mut strip, _) = strip();
        let _a = strip.open("https://a.example", true);
        let b = strip.open("https://b.example", false);
        assert_eq!(strip.snapshot(b).unwrap().index, 1);
        assert!(strip.snapshot(TabHandle(999)).is_none());
    }

    #[test]
    fn folders_track_members_and_vanish_when_empty() {
        let (mut strip, _) = strip();
        let a = strip.open("https://a.example", true);
        let b = strip.open("https://b.example", false);
        let folder = strip.create_folder("Group 1", "blue");

        assert!(strip.assign(a, Some(folder)));
        assert!(strip.assign(b, Some(folder)));
        assert_eq!(strip.folder(folder).unwrap().tabs, vec![a, b]);

        strip.assign(a, None);
        assert_eq!(strip.folder(folder).unwrap().tabs, vec![b]);

        strip.close(b);
        assert!(strip.folder(folder).is_none());
    }

    #[test]
    fn assign_to_unknown_folder_fails() {
        let (mut strip, _) = strip();
        let a = strip.open("https://a.example", true);
        assert!(!strip.assign(a, Some(FolderHandle(404))));
    }

    #[test]
    fn update_folder_applies_only_given_fields() {
        let (mut strip, _) = strip();
        let a = strip.open("https://a.example", true);
        let folder = strip.create_folder("Group 1", "red");
        strip.assign(a, Some(folder));

        strip.update_folder(
            folder,
            FolderUpdate {
                title: Some("Work".into()),
                collapsed: Some(true),
                ..Default::default()
            },
        );
        let snap = strip.folder(folder).unwrap();
        assert_eq!(snap.title, "Work");
        assert_eq!(snap.color, "red");
        assert!(snap.collapsed);
        assert!(!snap.pinned);
    }
}
