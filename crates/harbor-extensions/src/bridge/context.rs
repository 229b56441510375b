use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use harbor_common::{ContextId, TabHandle};
use serde_json::Value;

use super::HostMessage;
use crate::sync::lock;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique script-context id.
pub fn next_context_id() -> ContextId {
    ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRole {
    Background,
    Page,
}

/// A live script environment hosting the bridged API.
///
/// The UI layer owns contexts; the runtime only holds weak references and
/// pushes messages through `post`.
pub trait ScriptContext: Send + Sync {
    fn id(&self) -> ContextId;
    fn role(&self) -> ContextRole;

    /// Tab hosting this context, for content scripts and tab pages.
    fn tab(&self) -> Option<TabHandle> {
        None
    }

    fn url(&self) -> Option<String> {
        None
    }

    fn post(&self, message: HostMessage);
}

/// Context that keeps every message posted to it.
///
/// Stands in for a real script environment in the headless host.
pub struct RecordingContext {
    id: ContextId,
    role: ContextRole,
    tab: Option<TabHandle>,
    url: Option<String>,
    messages: Mutex<Vec<HostMessage>>,
}

impl RecordingContext {
    pub fn new(role: ContextRole, tab: Option<TabHandle>, url: Option<String>) -> Self {
        Self {
            id: next_context_id(),
            role,
            tab,
            url,
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn background() -> Self {
        Self::new(ContextRole::Background, None, None)
    }

    pub fn page(tab: Option<TabHandle>) -> Self {
        Self::new(ContextRole::Page, tab, None)
    }

    pub fn messages(&self) -> Vec<HostMessage> {
        lock(&self.messages).clone()
    }

    /// Payloads of every event named `name`, in delivery order.
    pub fn events(&self, name: &str) -> Vec<Value> {
        lock(&self.messages)
            .iter()
            .filter_map(|m| match m {
                HostMessage::Event { name: n, payload } if n == name => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn replies(&self) -> Vec<(u64, Value)> {
        lock(&self.messages)
            .iter()
            .filter_map(|m| match m {
                HostMessage::Reply { callback_id, value } => Some((*callback_id, value.clone())),
                _ => None,
            })
            .collect()
    }
}

impl ScriptContext for RecordingContext {
    fn id(&self) -> ContextId {
        self.id
    }

    fn role(&self) -> ContextRole {
        self.role
    }

    fn tab(&self) -> Option<TabHandle> {
        self.tab
    }

    fn url(&self) -> Option<String> {
        self.url.clone()
    }

    fn post(&self, message: HostMessage) {
        lock(&self.messages).push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn context_ids_are_unique() {
        let a = next_context_id();
        let b = next_context_id();
        assert_ne!(a, b);
    }

    #[test]
    fn recording_context_splits_events_and_replies() {
        let ctx = RecordingContext::page(Some(TabHandle(4)));
        ctx.post(HostMessage::event("storage.onChanged", json!({"a": 1})));
        ctx.post(HostMessage::reply(1, json!(true)));
        ctx.post(HostMessage::event("alarms.onAlarm", json!({"name": "x"})));

        assert_eq!(ctx.role(), ContextRole::Page);
        assert_eq!(ctx.tab(), Some(TabHandle(4)));
        assert_eq!(ctx.messages().len(), 3);
        assert_eq!(ctx.events("storage.onChanged"), vec![json!({"a": 1})]);
        assert_eq!(ctx.replies(), vec![(1, json!(true))]);
    }
}
