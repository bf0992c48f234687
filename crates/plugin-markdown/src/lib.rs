//! Markdown support plugin for Quill.
//!
//! Registers a formatter service, the `.md` / `.markdown` file handler, an
//! outline toolbar item, heading highlighting and its menu strings. Ships
//! compiled into the editor, and can also be built as a shared library
//! with the `export` feature.

pub mod format;
pub mod outline;
pub mod plugin;

pub use format::{FormatOptions, MarkdownFormatter};
pub use outline::{Heading, outline};
pub use plugin::MarkdownPlugin;

#[cfg(feature = "export")]
quill_plugin_sdk::export_plugins!(MarkdownPlugin::new());
