//! Extension compatibility runtime for the Harbor shell.
//!
//! Hosts a Chrome-extension-like API surface on the privileged side and
//! bridges it into script contexts (background, popups, content scripts)
//! over an asynchronous call envelope:
//!
//! - **JS -> host**: `{api, method, params, callbackId}` decoded by [`bridge::Call`]
//!   and routed through [`runtime::ExtensionRuntime::handle`].
//! - **host -> JS**: [`bridge::HostMessage`] replies and events, injected
//!   into the context by evaluating a script against its callback table.
//!
//! Shared host services (tab host, identity maps, messaging, alarms,
//! notifications) live in [`shell::Shell`]; per-extension stores live in
//! [`state::ExtensionState`].

pub mod api;
pub mod background;
pub mod bridge;
pub mod identity;
pub mod manifest;
pub mod match_pattern;
pub mod messaging;
pub mod profile;
pub mod registry;
pub mod runtime;
pub mod services;
pub mod shell;
pub mod state;

mod sync;

pub use background::{BackgroundHost, BackgroundLauncher, HeadlessLauncher, HostEvent};
pub use bridge::{Call, ContextRole, HostMessage, RecordingContext, ScriptContext};
pub use identity::{Identities, IdentityMap};
pub use manifest::{Manifest, RunAt};
pub use match_pattern::{ContentScriptGate, MatchPattern, MatchPatternSet};
pub use messaging::MessagingCenter;
pub use profile::{ApiBundle, ManifestProfile};
pub use registry::{ExtensionRegistry, LoadOutcome, NotificationActivation};
pub use runtime::ExtensionRuntime;
pub use shell::{Shell, ShellBuilder, ShellSettings};
