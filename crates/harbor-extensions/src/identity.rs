//! Stable small-integer ids for host objects.
//!
//! Scripts see tabs, windows and groups as plain integers. Each map hands
//! out ids from its own monotonic counter starting at 1 and never reuses
//! one, even after the host object is gone.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

use harbor_common::{FolderHandle, TabHandle, WindowHandle};

use crate::sync::lock;

pub struct IdentityMap<H> {
    inner: Mutex<Inner<H>>,
}

struct Inner<H> {
    next: i64,
    by_handle: HashMap<H, i64>,
    by_id: HashMap<i64, H>,
}

impl<H: Copy + Eq + Hash> IdentityMap<H> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next: 1,
                by_handle: HashMap::new(),
                by_id: HashMap::new(),
            }),
        }
    }

    /// Id for a handle, allocating one on first sight.
    pub fn id_for(&self, handle: H) -> i64 {
        let mut inner = lock(&self.inner);
        if let Some(id) = inner.by_handle.get(&handle) {
            return *id;
        }
        let id = inner.next;
        inner.next += 1;
        inner.by_handle.insert(handle, id);
        inner.by_id.insert(id, handle);
        id
    }

    pub fn handle_for(&self, id: i64) -> Option<H> {
        lock(&self.inner).by_id.get(&id).copied()
    }

    /// Drop the entry for a handle. The id stays burned.
    pub fn forget(&self, handle: H) -> Option<i64> {
        let mut inner = lock(&self.inner);
        let id = inner.by_handle.remove(&handle)?;
        inner.by_id.remove(&id);
        Some(id)
    }

    /// Keep only the handles for which `alive` returns true.
    pub fn retain(&self, mut alive: impl FnMut(&H) -> bool) -> Vec<i64> {
        let mut inner = lock(&self.inner);
        let dead: Vec<(H, i64)> = inner
            .by_handle
            .iter()
            .filter(|(h, _)| !alive(h))
            .map(|(h, id)| (*h, *id))
            .collect();
        for (handle, id) in &dead {
            inner.by_handle.remove(handle);
            inner.by_id.remove(id);
        }
        dead.into_iter().map(|(_, id)| id).collect()
    }

    pub fn contains(&self, handle: H) -> bool {
        lock(&self.inner).by_handle.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<H: Copy + Eq + Hash> Default for IdentityMap<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// The three id namespaces exposed to scripts.
#[derive(Default)]
pub struct Identities {
    pub tabs: IdentityMap<TabHandle>,
    pub windows: IdentityMap<WindowHandle>,
    pub groups: IdentityMap<FolderHandle>,
}
