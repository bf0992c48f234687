//! # quill-plugin
//!
//! Plugin host runtime for the Quill editor. Provides:
//!
//! - Plugin lifecycle management (load, start, stop, unload) with panic and
//!   error containment
//! - Per-plugin lifecycle contexts exposing an owner-tagged registration
//!   surface for services, UI contributions and string overrides
//! - Reference-counted execution contexts so a shared library is closed
//!   exactly once, after the last plugin it carried is gone
//! - Cleanup hooks purging everything a plugin registered when it stops
//! - Built-in and (feature `dynamic`) shared-library discovery
//! - A single-thread service for driving the host from async code

#[macro_use]
mod macros;

mod containment;

pub mod api;
pub mod discovery;
pub mod execution;
pub mod exports;
pub mod ffi;
pub mod hooks;
pub mod loader;
pub mod manager;
pub mod prelude;
pub mod registry;
pub mod service;
pub mod traits;
pub mod types;

pub use api::context::{PluginContext, Registrar};
pub use api::events::{ChannelListener, FnListener, PluginEvent, PluginListener};
pub use api::host::EditorInfo;
pub use discovery::{
    BuiltinDiscovery, DiscoveredUnit, Discovery, DiscoveryChain, DiscoveryResult,
};
pub use execution::{
    ExecutionContextHandle, ExecutionContextRegistry, ReleaseAction, ReleaseError,
};
pub use exports::PluginExport;
pub use hooks::{CleanupHook, CleanupHooks};
pub use loader::LibraryDiscovery;
pub use manager::{LoadReport, PluginManager, PluginManagerBuilder, ToggleOutcome};
pub use service::{PluginHostHandle, PluginHostService};
pub use traits::{Plugin, PluginError};
pub use types::{
    ActivationPolicy, PluginId, PluginMetadata, PluginOrigin, PluginSnapshot, PluginState,
    RestartPolicy,
};
