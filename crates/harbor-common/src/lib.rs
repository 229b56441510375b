pub mod errors;
pub mod events;
pub mod id;
pub mod types;

pub use errors::{ConfigError, ExtensionError, HarborError, PlatformError};
pub use events::{Event, EventBus};
pub use id::{new_correlation_id, new_id};
pub use types::{ContextId, ExtensionId, FolderHandle, TabHandle, WindowHandle};

pub type Result<T> = std::result::Result<T, HarborError>;
