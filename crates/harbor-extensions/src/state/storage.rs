//! `storage.local` / `storage.session` key-value areas.

use std::fmt;
use std::sync::{Arc, Mutex};

use harbor_common::{ExtensionError, ExtensionId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, warn};

use crate::services::DurableStore;
use crate::sync::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaName {
    Local,
    Session,
}

impl AreaName {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "local" => Some(AreaName::Local),
            "session" => Some(AreaName::Session),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AreaName::Local => "local",
            AreaName::Session => "session",
        }
    }
}

impl fmt::Display for AreaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `keys` argument of `get`.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySelector {
    All,
    Keys(Vec<String>),
    /// Keys with fallback values for the ones that are absent.
    Defaults(Map<String, Value>),
}

impl KeySelector {
    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        match value {
            None | Some(Value::Null) => Some(KeySelector::All),
            Some(Value::String(key)) => Some(KeySelector::Keys(vec![key.clone()])),
            Some(Value::Array(keys)) => keys
                .iter()
                .map(|k| k.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(KeySelector::Keys),
            Some(Value::Object(defaults)) => Some(KeySelector::Defaults(defaults.clone())),
            Some(_) => None,
        }
    }
}

/// `{key: {oldValue?, newValue?}}` as delivered by `storage.onChanged`.
pub type StorageChanges = Map<String, Value>;

struct Backing {
    store: Arc<dyn DurableStore>,
    extension: ExtensionId,
}

pub struct StorageArea {
    name: AreaName,
    items: Mutex<Map<String, Value>>,
    backing: Option<Backing>,
    quota_bytes: usize,
}

impl StorageArea {
    /// An area that starts empty and lives only in memory.
    pub fn in_memory(name: AreaName, quota_bytes: usize) -> Self {
        Self {
            name,
            items: Mutex::new(Map::new()),
            backing: None,
            quota_bytes,
        }
    }

    /// A durable area, seeded from whatever the store already holds.
    pub fn durable(store: Arc<dyn DurableStore>, extension: ExtensionId, quota_bytes: usize) -> Self {
        let items = match store.load(&extension) {
            Ok(items) => items,
            Err(e) => {
                warn!(extension = %extension, error = %e, "could not load local storage, starting empty");
                Map::new()
            }
        };
        Self {
            name: AreaName::Local,
            items: Mutex::new(items),
            backing: Some(Backing { store, extension }),
            quota_bytes,
        }
    }

    pub fn name(&self) -> AreaName {
        self.name
    }

    pub fn get(&self, keys: &KeySelector) -> Map<String, Value> {
        let items = lock(&self.items);
        match keys {
            KeySelector::All => items.clone(),
            KeySelector::Keys(keys) => keys
                .iter()
                .filter_map(|k| items.get(k).map(|v| (k.clone(), v.clone())))
                .collect(),
            KeySelector::Defaults(defaults) => defaults
                .iter()
                .map(|(k, fallback)| {
                    (k.clone(), items.get(k).cloned().unwrap_or_else(|| fallback.clone()))
                })
                .collect(),
        }
    }

    /// Merge `updates` into the area. Keys whose value is unchanged do not
    /// appear in the returned change set.
    pub fn set(&self, updates: Map<String, Value>) -> Result<StorageChanges, ExtensionError> {
        let mut items = lock(&self.items);
        let mut next = items.clone();
        let mut changes = Map::new();
        for (key, value) in updates {
            let old = next.insert(key.clone(), value.clone());
            if old.as_ref() != Some(&value) {
                changes.insert(key, change(old, Some(value)));
            }
        }

        let used = bytes_in_use(&next);
        if used > self.quota_bytes {
            return Err(ExtensionError::Storage(format!(
                "{} area quota exceeded ({used} > {} bytes)",
                self.name, self.quota_bytes
            )));
        }

        if !changes.is_empty() {
            *items = next;
            self.persist(&items);
        }
        Ok(changes)
    }

    pub fn remove(&self, keys: &[String]) -> StorageChanges {
        let mut items = lock(&self.items);
        let changes: StorageChanges = keys
            .iter()
            .filter_map(|k| items.remove(k).map(|old| (k.clone(), change(Some(old), None))))
            .collect();
        if !changes.is_empty() {
            self.persist(&items);
        }
        changes
    }

    pub fn clear(&self) -> StorageChanges {
        let mut items = lock(&self.items);
        let changes: StorageChanges = std::mem::take(&mut *items)
            .into_iter()
            .map(|(k, old)| (k, change(Some(old), None)))
            .collect();
        if !changes.is_empty() {
            self.persist(&items);
        }
        changes
    }

    pub fn bytes_in_use(&self) -> usize {
        bytes_in_use(&lock(&self.items))
    }

    fn persist(&self, items: &Map<String, Value>) {
        if let Some(backing) = &self.backing {
            if let Err(e) = backing.store.save(&backing.extension, items) {
                error!(extension = %backing.extension, error = %e, "failed to persist local storage");
            }
        }
    }
}

fn change(old: Option<Value>, new: Option<Value>) -> Value {
    let mut entry = Map::new();
    if let Some(old) = old {
        entry.insert("oldValue".into(), old);
    }
    if let Some(new) = new {
        entry.insert("newValue".into(), new);
    }
    Value::Object(entry)
}

fn bytes_in_use(items: &Map<String, Value>) -> usize {
    items
        .iter()
        .map(|(k, v)| k.len() + serde_json::to_string(v).map(|s| s.len()).unwrap_or(0))
        .sum()
}

/// Both areas of one extension.
pub struct ExtensionStorage {
    pub local: StorageArea,
    pub session: StorageArea,
}

impl ExtensionStorage {
    pub fn area(&self, name: AreaName) -> &StorageArea {
        match name {
            AreaName::Local => &self.local,
            AreaName::Session => &self.session,
        }
    }

    /// Payload for `storage.onChanged`.
    pub fn changed_event(changes: StorageChanges, area: AreaName) -> Value {
        json!({ "changes": changes, "areaName": area.as_str() })
    }
}
