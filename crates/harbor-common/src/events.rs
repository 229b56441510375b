use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::ExtensionId;

/// Host lifecycle events. Distinct from the events delivered *into*
/// script contexts; these are for the shell and its logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    ConfigReloaded,
    ExtensionLoaded { id: ExtensionId, name: String },
    ExtensionFailed { path: String, reason: String },
    ExtensionRemoved(ExtensionId),
    Shutdown,
    #[serde(other)]
    Unknown,
}

pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: Event) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(Event::ConfigReloaded);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::ConfigReloaded));
    }

    #[tokio::test]
    async fn extension_lifecycle_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let id = ExtensionId::from("abc");

        bus.publish(Event::ExtensionLoaded {
            id: id.clone(),
            name: "Reader".into(),
        });
        bus.publish(Event::ExtensionRemoved(id.clone()));

        let e1 = rx.recv().await.unwrap();
        assert!(matches!(e1, Event::ExtensionLoaded { ref name, .. } if name == "Reader"));
        let e2 = rx.recv().await.unwrap();
        assert!(matches!(e2, Event::ExtensionRemoved(ref removed) if *removed == id));
    }

    #[test]
    fn publish_returns_zero_with_no_subscribers() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(Event::Shutdown), 0);
    }

    #[test]
    fn unknown_event_deserializes() {
        let json = r#"{"type":"SomethingNew","data":null}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert!(matches!(event, Event::Unknown));
    }
}
