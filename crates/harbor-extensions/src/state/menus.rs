//! Context-menu items registered by one extension.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<String>>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
}

/// `createProperties` / `updateProperties`. Ids may be strings or numbers
/// on the script side; the host keeps them as strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MenuProps {
    pub id: Option<Value>,
    pub parent_id: Option<Value>,
    pub title: Option<String>,
    pub enabled: Option<bool>,
    pub contexts: Option<Vec<String>>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub checked: Option<bool>,
}

/// Normalize a script-side menu id to its string form.
pub fn menu_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A top-level item with its direct children, as handed to the native menu.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuNode {
    pub item: MenuItem,
    pub children: Vec<MenuItem>,
}

#[derive(Debug, Default)]
pub struct ContextMenus {
    items: Vec<MenuItem>,
    next_id: u64,
}

impl ContextMenus {
    /// Store an item, replacing any with the same id. Returns the id.
    pub fn create(&mut self, props: MenuProps) -> String {
        let id = match props.id.as_ref().and_then(menu_id) {
            Some(id) => id,
            // Generated ids skip any an extension chose explicitly.
            None => loop {
                self.next_id += 1;
                let candidate = self.next_id.to_string();
                if self.get(&candidate).is_none() {
                    break candidate;
                }
            },
        };
        let item = MenuItem {
            id: id.clone(),
            parent_id: props.parent_id.as_ref().and_then(menu_id),
            title: props.title,
            enabled: props.enabled.unwrap_or(true),
            contexts: props.contexts,
            kind: props.kind,
            checked: props.checked,
        };
        match self.items.iter_mut().find(|i| i.id == id) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
        id
    }

    pub fn update(&mut self, id: &str, props: MenuProps) -> bool {
        let Some(item) = self.items.iter_mut().find(|i| i.id == id) else {
            return false;
        };
        if let Some(parent) = props.parent_id.as_ref().and_then(menu_id) {
            item.parent_id = Some(parent);
        }
        if props.title.is_some() {
            item.title = props.title;
        }
        if let Some(enabled) = props.enabled {
            item.enabled = enabled;
        }
        if props.contexts.is_some() {
            item.contexts = props.contexts;
        }
        if props.kind.is_some() {
            item.kind = props.kind;
        }
        if props.checked.is_some() {
            item.checked = props.checked;
        }
        true
    }

    /// Remove an item and the items directly parented to it. Grandchildren
    /// are left in place.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items
            .retain(|i| i.id != id && i.parent_id.as_deref() != Some(id));
        self.items.len() != before
    }

    pub fn remove_all(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, id: &str) -> Option<&MenuItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    /// Top-level items with their direct children, in creation order.
    pub fn tree(&self) -> Vec<MenuNode> {
        self.items
            .iter()
            .filter(|i| i.parent_id.is_none())
            .map(|top| MenuNode {
                item: top.clone(),
                children: self
                    .items
                    .iter()
                    .filter(|i| i.parent_id.as_deref() == Some(top.id.as_str()))
                    .cloned()
                    .collect(),
            })
            .collect()
    }
}
