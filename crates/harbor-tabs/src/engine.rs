//! Web-engine view abstraction.
//!
//! One `EngineView` backs each tab. The real shell hands out system web
//! views; `HeadlessEngine` records what would have happened, which is what
//! the CLI host and the tests use.

use std::sync::{Arc, Mutex, PoisonError};

use harbor_common::TabHandle;
use serde_json::Value;
use tracing::debug;

pub trait EngineView: Send {
    fn load(&mut self, url: &str);
    fn reload(&mut self);
    /// Evaluate a script in the page. Returns the completion value when the
    /// engine can report one synchronously.
    fn evaluate_script(&mut self, script: &str) -> Option<Value>;
}

pub trait EngineFactory: Send + Sync {
    fn create_view(&self, tab: TabHandle) -> Box<dyn EngineView>;
}

/// Something a headless view was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineRecord {
    Load { tab: TabHandle, url: String },
    Reload { tab: TabHandle },
    Evaluate { tab: TabHandle, script: String },
}

impl EngineRecord {
    pub fn tab(&self) -> TabHandle {
        match self {
            EngineRecord::Load { tab, .. }
            | EngineRecord::Reload { tab }
            | EngineRecord::Evaluate { tab, .. } => *tab,
        }
    }
}

/// Engine factory that renders nothing and keeps a shared log of requests.
#[derive(Clone, Default)]
pub struct HeadlessEngine {
    records: Arc<Mutex<Vec<EngineRecord>>>,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EngineRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn loads_for(&self, tab: TabHandle) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                EngineRecord::Load { tab: t, url } if t == tab => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn scripts_for(&self, tab: TabHandle) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                EngineRecord::Evaluate { tab: t, script } if t == tab => Some(script),
                _ => None,
            })
            .collect()
    }
}

impl EngineFactory for HeadlessEngine {
    fn create_view(&self, tab: TabHandle) -> Box<dyn EngineView> {
        Box::new(HeadlessView {
            tab,
            records: Arc::clone(&self.records),
        })
    }
}

struct HeadlessView {
    tab: TabHandle,
    records: Arc<Mutex<Vec<EngineRecord>>>,
}

impl HeadlessView {
    fn push(&self, record: EngineRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}

impl EngineView for HeadlessView {
    fn load(&mut self, url: &str) {
        debug!(tab = %self.tab, url, "headless load");
        self.push(EngineRecord::Load {
            tab: self.tab,
            url: url.to_string(),
        });
    }

    fn reload(&mut self) {
        self.push(EngineRecord::Reload { tab: self.tab });
    }

    fn evaluate_script(&mut self, script: &str) -> Option<Value> {
        self.push(EngineRecord::Evaluate {
            tab: self.tab,
            script: script.to_string(),
        });
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_views_share_one_log() {
        let engine = HeadlessEngine::new();
        let mut a = engine.create_view(TabHandle(1));
        let mut b = engine.create_view(TabHandle(2));

        a.load("https://a.example");
        b.reload();
        assert_eq!(a.evaluate_script("1 + 1"), None);

        let records = engine.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].tab(), TabHandle(2));
        assert_eq!(engine.loads_for(TabHandle(1)), vec!["https://a.example"]);
        assert_eq!(engine.scripts_for(TabHandle(1)), vec!["1 + 1"]);
        assert!(engine.loads_for(TabHandle(2)).is_empty());
    }
}
