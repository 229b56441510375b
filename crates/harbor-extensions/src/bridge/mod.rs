//! Call-envelope codec between script contexts and the host.
//!
//! - **script -> host**: the page shim posts
//!   `JSON.stringify({api, method, params, callbackId})`, decoded into [`Call`].
//! - **host -> script**: [`HostMessage`] is rendered into a script that is
//!   evaluated in the context, resolving a callback or firing an event.

mod context;
mod envelope;
mod script;

pub use context::{next_context_id, ContextRole, RecordingContext, ScriptContext};
pub use envelope::{Call, HostMessage};
pub use script::{content_script_prelude, js_emit, js_resolve, BRIDGE_INIT_SCRIPT};
