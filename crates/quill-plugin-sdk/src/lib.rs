//! # quill-plugin-sdk
//!
//! SDK for developing plugins for the Quill editor.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quill_plugin_sdk::prelude::*;
//!
//! #[derive(Default)]
//! struct WordCount;
//!
//! impl Plugin for WordCount {
//!     fn describe(&self) -> PluginMetadata {
//!         plugin_metadata!(id: "word-count", name: "Word Count")
//!     }
//!
//!     fn activate(&mut self, ctx: &mut PluginContext) -> Result<(), PluginError> {
//!         ctx.contribute(Contribution::ToolbarItem {
//!             id: "word-count.show".into(),
//!             label: "word-count.label".into(),
//!             command: "word-count.show".into(),
//!         })
//!     }
//! }
//!
//! // In a `cdylib` crate:
//! export_plugins!(WordCount);
//! ```

pub use quill_plugin::{export_plugins, plugin_metadata};

/// Version of the plugin library contract this SDK builds against.
pub const ABI_VERSION: u32 = quill_plugin::ffi::QUILL_PLUGIN_ABI_VERSION;

/// Prelude for convenient imports.
pub mod prelude {
    pub use quill_core::error::AppError;
    pub use quill_plugin::prelude::*;
    pub use tracing::{debug, error, info, warn};
}
