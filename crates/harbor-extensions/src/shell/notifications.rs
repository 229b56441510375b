//! Maps OS notification deliveries back to `(extension, logical id)`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use harbor_common::{new_id, ExtensionId};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::services::NotificationService;
use crate::sync::lock;

/// `options` of `notifications.create`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationOptions {
    pub title: String,
    pub message: String,
    pub context_message: Option<String>,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub extension: ExtensionId,
    pub logical_id: String,
}

pub struct NotificationCenter {
    service: Arc<dyn NotificationService>,
    enabled: bool,
    permission: OnceCell<bool>,
    deliveries: Mutex<HashMap<String, Delivery>>,
}

impl NotificationCenter {
    pub fn new(service: Arc<dyn NotificationService>, enabled: bool) -> Self {
        Self {
            service,
            enabled,
            permission: OnceCell::new(),
            deliveries: Mutex::new(HashMap::new()),
        }
    }

    /// OS permission, requested on first use and remembered.
    async fn permitted(&self) -> bool {
        *self
            .permission
            .get_or_init(|| async {
                let granted = self.service.request_permission().await;
                info!(granted, "notification permission resolved");
                granted
            })
            .await
    }

    /// Post a notification. Re-using a logical id replaces the previous one.
    pub async fn show(&self, extension: &ExtensionId, logical_id: &str, options: &NotificationOptions) -> bool {
        if !self.enabled {
            warn!(extension = %extension, "notifications disabled by config");
            return false;
        }
        if !self.permitted().await {
            return false;
        }
        self.clear(extension, logical_id);

        let delivery_id = new_id();
        if let Err(e) = self.service.show(
            &delivery_id,
            &options.title,
            &options.message,
            options.context_message.as_deref(),
        ) {
            warn!(extension = %extension, error = %e, "notification failed");
            return false;
        }
        lock(&self.deliveries).insert(
            delivery_id,
            Delivery {
                extension: extension.clone(),
                logical_id: logical_id.to_string(),
            },
        );
        true
    }

    pub fn clear(&self, extension: &ExtensionId, logical_id: &str) -> bool {
        let mut deliveries = lock(&self.deliveries);
        let found: Vec<String> = deliveries
            .iter()
            .filter(|(_, d)| &d.extension == extension && d.logical_id == logical_id)
            .map(|(k, _)| k.clone())
            .collect();
        for delivery_id in &found {
            deliveries.remove(delivery_id);
            self.service.withdraw(delivery_id);
        }
        !found.is_empty()
    }

    /// Logical ids currently shown for one extension, sorted.
    pub fn active(&self, extension: &ExtensionId) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.deliveries)
            .values()
            .filter(|d| &d.extension == extension)
            .map(|d| d.logical_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn resolve(&self, delivery_id: &str) -> Option<Delivery> {
        lock(&self.deliveries).get(delivery_id).cloned()
    }

    /// Resolve and forget, for deliveries the OS reports as closed.
    pub fn take(&self, delivery_id: &str) -> Option<Delivery> {
        lock(&self.deliveries).remove(delivery_id)
    }

    /// Delivery ids currently shown for one extension.
    pub fn deliveries_for(&self, extension: &ExtensionId) -> Vec<String> {
        lock(&self.deliveries)
            .iter()
            .filter(|(_, d)| &d.extension == extension)
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn forget_extension(&self, extension: &ExtensionId) {
        let mut deliveries = lock(&self.deliveries);
        deliveries.retain(|delivery_id, d| {
            let keep = &d.extension != extension;
            if !keep {
                self.service.withdraw(delivery_id);
            }
            keep
        });
    }
}
