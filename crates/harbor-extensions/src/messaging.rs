//! Message routing between an extension's script contexts.
//!
//! Each extension has one channel: at most one background peer and any
//! number of page peers, all held weakly. Routing follows two rules:
//! background -> every live page, page -> background only. Dead peers are
//! skipped and pruned whenever a table is walked.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use harbor_common::{new_id, ContextId, ExtensionId, TabHandle};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::debug;

use crate::bridge::{ContextRole, HostMessage, ScriptContext};
use crate::sync::lock;

pub const ON_MESSAGE: &str = "runtime.onMessage";
pub const ON_CONNECT: &str = "runtime.onConnect";
pub const ON_PORT_MESSAGE: &str = "runtime.onPortMessage";

#[derive(Clone)]
struct Peer {
    id: ContextId,
    context: Weak<dyn ScriptContext>,
}

impl Peer {
    fn new(context: &Arc<dyn ScriptContext>) -> Self {
        Self {
            id: context.id(),
            context: Arc::downgrade(context),
        }
    }

    fn upgrade(&self) -> Option<Arc<dyn ScriptContext>> {
        self.context.upgrade()
    }
}

#[derive(Default)]
struct Channel {
    background: Option<Peer>,
    pages: Vec<Peer>,
}

impl Channel {
    fn live_background(&mut self) -> Option<Arc<dyn ScriptContext>> {
        let context = self.background.as_ref().and_then(Peer::upgrade);
        if context.is_none() {
            self.background = None;
        }
        context
    }

    fn live_pages(&mut self) -> Vec<Arc<dyn ScriptContext>> {
        let mut live = Vec::with_capacity(self.pages.len());
        self.pages.retain(|peer| match peer.upgrade() {
            Some(context) => {
                live.push(context);
                true
            }
            None => false,
        });
        live
    }
}

struct Port {
    extension: ExtensionId,
    opener: Peer,
    peers: Vec<Peer>,
}

struct PendingResponse {
    extension: ExtensionId,
    reply: oneshot::Sender<Value>,
    /// Recipients that have neither answered nor declined.
    remaining: usize,
}

#[derive(Default)]
struct Tables {
    channels: HashMap<ExtensionId, Channel>,
    ports: HashMap<String, Port>,
    pending: HashMap<String, PendingResponse>,
}

#[derive(Default)]
pub struct MessagingCenter {
    tables: Mutex<Tables>,
}

impl MessagingCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the background peer, replacing any previous one.
    pub fn register_background(&self, extension: &ExtensionId, context: &Arc<dyn ScriptContext>) {
        let mut tables = lock(&self.tables);
        tables.channels.entry(extension.clone()).or_default().background = Some(Peer::new(context));
        debug!(extension = %extension, context = %context.id(), "background registered");
    }

    pub fn register_page(&self, extension: &ExtensionId, context: &Arc<dyn ScriptContext>) {
        let mut tables = lock(&self.tables);
        let channel = tables.channels.entry(extension.clone()).or_default();
        if !channel.pages.iter().any(|p| p.id == context.id()) {
            channel.pages.push(Peer::new(context));
        }
        debug!(extension = %extension, context = %context.id(), "page registered");
    }

    pub fn unregister(&self, extension: &ExtensionId, context: ContextId) {
        let mut tables = lock(&self.tables);
        if let Some(channel) = tables.channels.get_mut(extension) {
            if channel.background.as_ref().is_some_and(|p| p.id == context) {
                channel.background = None;
            }
            channel.pages.retain(|p| p.id != context);
        }
        tables
            .ports
            .retain(|_, port| port.opener.id != context && !port.peers.iter().any(|p| p.id == context));
    }

    /// Drop everything routed for an extension.
    pub fn remove_extension(&self, extension: &ExtensionId) {
        let mut tables = lock(&self.tables);
        tables.channels.remove(extension);
        tables.ports.retain(|_, port| &port.extension != extension);
        tables.pending.retain(|_, p| &p.extension != extension);
    }

    pub fn background(&self, extension: &ExtensionId) -> Option<Arc<dyn ScriptContext>> {
        lock(&self.tables)
            .channels
            .get_mut(extension)
            .and_then(Channel::live_background)
    }

    pub fn pages(&self, extension: &ExtensionId) -> Vec<Arc<dyn ScriptContext>> {
        lock(&self.tables)
            .channels
            .get_mut(extension)
            .map(Channel::live_pages)
            .unwrap_or_default()
    }

    /// Peers on the other side of `from`. Host-originated traffic goes to
    /// the background.
    fn recipients(
        &self,
        extension: &ExtensionId,
        from: Option<&Arc<dyn ScriptContext>>,
    ) -> Vec<Arc<dyn ScriptContext>> {
        let mut tables = lock(&self.tables);
        let Some(channel) = tables.channels.get_mut(extension) else {
            return Vec::new();
        };
        match from.map(|c| (c.role(), c.id())) {
            Some((ContextRole::Background, own)) => channel
                .live_pages()
                .into_iter()
                .filter(|p| p.id() != own)
                .collect(),
            Some((ContextRole::Page, own)) => channel
                .live_background()
                .filter(|b| b.id() != own)
                .into_iter()
                .collect(),
            None => channel.live_background().into_iter().collect(),
        }
    }

    /// Fan a `runtime.sendMessage` out. `None` when nobody can receive it,
    /// otherwise a receiver for the first response.
    pub fn send_message(
        &self,
        extension: &ExtensionId,
        from: Option<&Arc<dyn ScriptContext>>,
        message: Value,
        sender: Value,
    ) -> Option<oneshot::Receiver<Value>> {
        let recipients = self.recipients(extension, from);
        self.deliver_request(extension, recipients, message, sender)
    }

    /// `tabs.sendMessage`: deliver to the page contexts hosted in `tab`.
    pub fn send_to_tab(
        &self,
        extension: &ExtensionId,
        tab: TabHandle,
        message: Value,
        sender: Value,
    ) -> Option<oneshot::Receiver<Value>> {
        let recipients: Vec<_> = self
            .pages(extension)
            .into_iter()
            .filter(|p| p.tab() == Some(tab))
            .collect();
        self.deliver_request(extension, recipients, message, sender)
    }

    fn deliver_request(
        &self,
        extension: &ExtensionId,
        recipients: Vec<Arc<dyn ScriptContext>>,
        message: Value,
        sender: Value,
    ) -> Option<oneshot::Receiver<Value>> {
        if recipients.is_empty() {
            debug!(extension = %extension, "message has no live recipient");
            return None;
        }
        let response_id = new_id();
        let (tx, rx) = oneshot::channel();
        {
            let mut tables = lock(&self.tables);
            tables.pending.retain(|_, p| !p.reply.is_closed());
            tables.pending.insert(
                response_id.clone(),
                PendingResponse {
                    extension: extension.clone(),
                    reply: tx,
                    remaining: recipients.len(),
                },
            );
        }
        let payload = json!({ "message": message, "sender": sender, "responseId": response_id });
        for recipient in &recipients {
            recipient.post(HostMessage::event(ON_MESSAGE, payload.clone()));
        }
        debug!(extension = %extension, recipients = recipients.len(), "message delivered");
        Some(rx)
    }

    /// First response for a message wins; later ones are ignored.
    pub fn respond(&self, response_id: &str, value: Value) -> bool {
        let pending = lock(&self.tables).pending.remove(response_id);
        match pending {
            Some(p) => p.reply.send(value).is_ok(),
            None => false,
        }
    }

    /// A recipient will not answer. The sender gets null once every
    /// recipient has declined; a real answer still wins before that.
    pub fn decline(&self, response_id: &str) -> bool {
        let mut tables = lock(&self.tables);
        let Some(pending) = tables.pending.get_mut(response_id) else {
            return false;
        };
        pending.remaining = pending.remaining.saturating_sub(1);
        if pending.remaining == 0 {
            if let Some(p) = tables.pending.remove(response_id) {
                let _ = p.reply.send(Value::Null);
            }
        }
        true
    }

    /// Open a port from `from` and fire `runtime.onConnect` on every peer
    /// across the channel. Returns the port id.
    pub fn connect(
        &self,
        extension: &ExtensionId,
        from: &Arc<dyn ScriptContext>,
        name: &str,
        sender: Value,
    ) -> String {
        let peers = self.recipients(extension, Some(from));
        let port_id = new_id();
        lock(&self.tables).ports.insert(
            port_id.clone(),
            Port {
                extension: extension.clone(),
                opener: Peer::new(from),
                peers: peers.iter().map(Peer::new).collect(),
            },
        );
        let payload = json!({ "portId": port_id, "name": name, "sender": sender });
        for peer in &peers {
            peer.post(HostMessage::event(ON_CONNECT, payload.clone()));
        }
        debug!(extension = %extension, port = %port_id, name, peers = peers.len(), "port opened");
        port_id
    }

    /// Deliver a port message to the other end(s). Returns how many
    /// contexts received it.
    pub fn post_port_message(&self, port_id: &str, from: ContextId, message: Value) -> usize {
        let targets: Vec<Arc<dyn ScriptContext>> = {
            let tables = lock(&self.tables);
            let Some(port) = tables.ports.get(port_id) else {
                return 0;
            };
            let ends: Vec<&Peer> = if port.opener.id == from {
                port.peers.iter().collect()
            } else if port.peers.iter().any(|p| p.id == from) {
                vec![&port.opener]
            } else {
                Vec::new()
            };
            ends.into_iter().filter_map(Peer::upgrade).collect()
        };
        let payload = json!({ "portId": port_id, "message": message });
        for target in &targets {
            target.post(HostMessage::event(ON_PORT_MESSAGE, payload.clone()));
        }
        targets.len()
    }

    /// Forget a port. Neither end is notified.
    pub fn disconnect_port(&self, port_id: &str) -> bool {
        lock(&self.tables).ports.remove(port_id).is_some()
    }

    pub fn has_port(&self, port_id: &str) -> bool {
        lock(&self.tables).ports.contains_key(port_id)
    }

    /// Push an event to every live context of an extension.
    pub fn broadcast(&self, extension: &ExtensionId, name: &str, payload: Value) -> usize {
        let targets: Vec<Arc<dyn ScriptContext>> = {
            let mut tables = lock(&self.tables);
            let Some(channel) = tables.channels.get_mut(extension) else {
                return 0;
            };
            let mut targets = channel.live_pages();
            targets.extend(channel.live_background());
            targets
        };
        for target in &targets {
            target.post(HostMessage::event(name, payload.clone()));
        }
        targets.len()
    }

    pub fn emit_to_background(&self, extension: &ExtensionId, name: &str, payload: Value) -> bool {
        match self.background(extension) {
            Some(background) => {
                background.post(HostMessage::event(name, payload));
                true
            }
            None => {
                debug!(extension = %extension, event = name, "no background to receive event");
                false
            }
        }
    }
}
