//! Host collaborators the runtime consumes: consent prompts, OS
//! notifications, and durable key-value storage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use harbor_common::{ExtensionError, ExtensionId, PlatformError};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::sync::lock;

/// Asks the user to approve an optional-permission request.
#[async_trait]
pub trait ConsentPrompt: Send + Sync {
    async fn request(&self, extension: &str, permissions: &[String], origins: &[String]) -> bool;
}

/// Answers every prompt the same way. Used by the headless host.
pub struct AutoConsent(pub bool);

#[async_trait]
impl ConsentPrompt for AutoConsent {
    async fn request(&self, extension: &str, permissions: &[String], origins: &[String]) -> bool {
        info!(
            extension,
            ?permissions,
            ?origins,
            granted = self.0,
            "permission request answered automatically"
        );
        self.0
    }
}

/// OS notification surface.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Ask the OS for permission to post. Called at most once per process.
    async fn request_permission(&self) -> bool;

    fn show(
        &self,
        delivery_id: &str,
        title: &str,
        message: &str,
        context: Option<&str>,
    ) -> Result<(), PlatformError>;

    fn withdraw(&self, delivery_id: &str);
}

/// Writes notifications to the log instead of the OS.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationService for LogNotifier {
    async fn request_permission(&self) -> bool {
        true
    }

    fn show(
        &self,
        delivery_id: &str,
        title: &str,
        message: &str,
        context: Option<&str>,
    ) -> Result<(), PlatformError> {
        info!(delivery_id, title, message, context, "notification");
        Ok(())
    }

    fn withdraw(&self, delivery_id: &str) {
        debug!(delivery_id, "notification withdrawn");
    }
}

/// Durable backing for `storage.local`.
pub trait DurableStore: Send + Sync {
    fn load(&self, extension: &ExtensionId) -> Result<Map<String, Value>, ExtensionError>;
    fn save(&self, extension: &ExtensionId, items: &Map<String, Value>)
        -> Result<(), ExtensionError>;
}

#[derive(Default)]
pub struct MemoryStore {
    areas: Mutex<HashMap<ExtensionId, Map<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn load(&self, extension: &ExtensionId) -> Result<Map<String, Value>, ExtensionError> {
        Ok(lock(&self.areas).get(extension).cloned().unwrap_or_default())
    }

    fn save(
        &self,
        extension: &ExtensionId,
        items: &Map<String, Value>,
    ) -> Result<(), ExtensionError> {
        lock(&self.areas).insert(extension.clone(), items.clone());
        Ok(())
    }
}

/// One pretty-printed JSON file per extension: `<dir>/<extension-id>.json`.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, extension: &ExtensionId) -> PathBuf {
        self.dir.join(format!("{extension}.json"))
    }
}

impl DurableStore for JsonFileStore {
    fn load(&self, extension: &ExtensionId) -> Result<Map<String, Value>, ExtensionError> {
        let path = self.path_for(extension);
        if !path.exists() {
            return Ok(Map::new());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ExtensionError::Storage(format!("{}: {e}", path.display())))?;
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(items)) => Ok(items),
            Ok(_) => {
                warn!(path = %path.display(), "storage file is not an object, starting empty");
                Ok(Map::new())
            }
            Err(e) => Err(ExtensionError::Storage(format!("{}: {e}", path.display()))),
        }
    }

    fn save(
        &self,
        extension: &ExtensionId,
        items: &Map<String, Value>,
    ) -> Result<(), ExtensionError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| ExtensionError::Storage(format!("{}: {e}", self.dir.display())))?;
        let path = self.path_for(extension);
        let content = serde_json::to_string_pretty(items)
            .map_err(|e| ExtensionError::Storage(e.to_string()))?;
        std::fs::write(&path, content)
            .map_err(|e| ExtensionError::Storage(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), keys = items.len(), "storage saved");
        Ok(())
    }
}
