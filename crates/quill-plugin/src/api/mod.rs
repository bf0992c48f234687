//! Plugin API: the context handed to plugins and the notifications the
//! host emits about them.

pub mod context;
pub mod events;
pub mod host;

pub use context::{PluginContext, Registrar};
pub use events::{ChannelListener, FnListener, PluginEvent, PluginListener};
pub use host::EditorInfo;
