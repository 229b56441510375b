//! Script-facing descriptors and virtual-id resolution.
//!
//! Every lookup by virtual id checks that the host object still exists.
//! A stale id is forgotten and reported as not found.

use harbor_common::TabHandle;
use harbor_tabs::{FolderSnapshot, TabSnapshot};
use serde::Serialize;

use super::{Shell, WindowRecord, WINDOW_TYPE};

pub const WINDOW_ID_NONE: i64 = -1;
const GROUP_ID_NONE: i64 = -1;

/// Colors a new tab group may be given.
pub const GROUP_COLORS: [&str; 9] = [
    "grey", "blue", "red", "yellow", "green", "pink", "purple", "cyan", "orange",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabDescriptor {
    pub id: i64,
    pub index: usize,
    pub window_id: i64,
    pub active: bool,
    pub pinned: bool,
    pub url: String,
    pub title: String,
    pub group_id: i64,
    pub status: &'static str,
    pub discarded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDescriptor {
    pub id: i64,
    pub title: String,
    pub color: String,
    pub collapsed: bool,
    pub pinned: bool,
    pub window_id: i64,
    pub tab_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowDescriptor {
    pub id: i64,
    pub focused: bool,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub state: &'static str,
    pub incognito: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tabs: Option<Vec<TabDescriptor>>,
}

impl Shell {
    pub fn tab_id(&self, tab: TabHandle) -> i64 {
        self.ids.tabs.id_for(tab)
    }

    pub fn resolve_tab(&self, id: i64) -> Option<TabSnapshot> {
        let handle = self.ids.tabs.handle_for(id)?;
        let snapshot = self.tabs.tab(handle);
        if snapshot.is_none() {
            self.ids.tabs.forget(handle);
        }
        snapshot
    }

    pub fn tab_descriptor(&self, tab: &TabSnapshot) -> TabDescriptor {
        TabDescriptor {
            id: self.tab_id(tab.handle),
            index: tab.index,
            window_id: self
                .windows
                .for_tab(tab.handle)
                .map(|w| self.ids.windows.id_for(w.handle))
                .unwrap_or(WINDOW_ID_NONE),
            active: tab.active,
            pinned: tab.pinned,
            url: tab.url.clone(),
            title: tab.title.clone(),
            group_id: tab
                .folder
                .map(|f| self.ids.groups.id_for(f))
                .unwrap_or(GROUP_ID_NONE),
            status: if tab.loaded { "complete" } else { "unloaded" },
            discarded: !tab.loaded,
        }
    }

    /// Descriptors of every open tab, in strip order.
    pub fn all_tabs(&self) -> Vec<TabDescriptor> {
        self.tabs
            .tabs()
            .into_iter()
            .filter_map(|h| self.tabs.tab(h))
            .map(|t| self.tab_descriptor(&t))
            .collect()
    }

    pub fn resolve_group(&self, id: i64) -> Option<FolderSnapshot> {
        let handle = self.ids.groups.handle_for(id)?;
        let snapshot = self.tabs.folder(handle);
        if snapshot.is_none() {
            self.ids.groups.forget(handle);
        }
        snapshot
    }

    pub fn group_descriptor(&self, folder: &FolderSnapshot) -> GroupDescriptor {
        GroupDescriptor {
            id: self.ids.groups.id_for(folder.handle),
            title: folder.title.clone(),
            color: folder.color.clone(),
            collapsed: folder.collapsed,
            pinned: folder.pinned,
            window_id: WINDOW_ID_NONE,
            tab_ids: folder.tabs.iter().map(|t| self.tab_id(*t)).collect(),
        }
    }

    /// Drop windows whose tab is gone and forget their ids.
    pub fn prune_windows(&self) {
        for handle in self.windows.prune(|tab| self.tabs.tab(tab).is_some()) {
            self.ids.windows.forget(handle);
        }
    }

    pub fn resolve_window(&self, id: i64) -> Option<WindowRecord> {
        self.prune_windows();
        let handle = self.ids.windows.handle_for(id)?;
        let record = self.windows.get(handle);
        if record.is_none() {
            self.ids.windows.forget(handle);
        }
        record
    }

    pub fn window_descriptor(&self, window: &WindowRecord, populate: bool) -> WindowDescriptor {
        let tab = self.tabs.tab(window.tab);
        WindowDescriptor {
            id: self.ids.windows.id_for(window.handle),
            focused: tab.as_ref().is_some_and(|t| t.active),
            kind: WINDOW_TYPE,
            state: "normal",
            incognito: false,
            tabs: populate.then(|| {
                tab.iter().map(|t| self.tab_descriptor(t)).collect()
            }),
        }
    }
}
