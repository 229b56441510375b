//! Synthetic windows: every window is one tab wrapped in a record.

use std::collections::BTreeMap;
use std::sync::Mutex;

use harbor_common::{ExtensionId, TabHandle, WindowHandle};

use crate::sync::lock;

/// The only window type this host produces.
pub const WINDOW_TYPE: &str = "popup";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRecord {
    pub handle: WindowHandle,
    pub tab: TabHandle,
    pub owner: Option<ExtensionId>,
}

#[derive(Default)]
pub struct WindowRegistry {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next: u64,
    records: BTreeMap<WindowHandle, WindowRecord>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, tab: TabHandle, owner: Option<ExtensionId>) -> WindowHandle {
        let mut inner = lock(&self.inner);
        inner.next += 1;
        let handle = WindowHandle(inner.next);
        inner.records.insert(handle, WindowRecord { handle, tab, owner });
        handle
    }

    pub fn get(&self, handle: WindowHandle) -> Option<WindowRecord> {
        lock(&self.inner).records.get(&handle).cloned()
    }

    /// The window wrapping `tab`, if any.
    pub fn for_tab(&self, tab: TabHandle) -> Option<WindowRecord> {
        lock(&self.inner)
            .records
            .values()
            .find(|r| r.tab == tab)
            .cloned()
    }

    pub fn all(&self) -> Vec<WindowRecord> {
        lock(&self.inner).records.values().cloned().collect()
    }

    pub fn remove(&self, handle: WindowHandle) -> Option<WindowRecord> {
        lock(&self.inner).records.remove(&handle)
    }

    /// Drop windows whose tab is gone. Returns the dropped handles.
    pub fn prune(&self, tab_alive: impl Fn(TabHandle) -> bool) -> Vec<WindowHandle> {
        let mut inner = lock(&self.inner);
        let dead: Vec<WindowHandle> = inner
            .records
            .values()
            .filter(|r| !tab_alive(r.tab))
            .map(|r| r.handle)
            .collect();
        for handle in &dead {
            inner.records.remove(handle);
        }
        dead
    }

    /// Drop every window an extension opened. Returns the dropped records.
    pub fn remove_owned(&self, owner: &ExtensionId) -> Vec<WindowRecord> {
        let mut inner = lock(&self.inner);
        let owned: Vec<WindowHandle> = inner
            .records
            .values()
            .filter(|r| r.owner.as_ref() == Some(owner))
            .map(|r| r.handle)
            .collect();
        owned
            .into_iter()
            .filter_map(|h| inner.records.remove(&h))
            .collect()
    }
}
