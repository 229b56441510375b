//! Tab model for the Harbor shell.
//!
//! `TabStrip` holds the ordered tabs, the active selection, pin state,
//! lazy engine loading, and tab folders. `Browser` wraps a strip behind a
//! lock and implements `TabHost`, the interface the extension runtime
//! drives. Rendering is delegated to an `EngineView` per tab.

pub mod engine;
pub mod host;
pub mod strip;

pub use engine::{EngineFactory, EngineRecord, EngineView, HeadlessEngine};
pub use host::{Browser, FolderSnapshot, FolderUpdate, TabHost, TabSnapshot};
pub use strip::TabStrip;
