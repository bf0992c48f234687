//! Symbols a plugin library must export.
//!
//! Plugins are Rust `cdylib`s built against the same `quill-plugin`
//! version as the host. The [`export_plugins!`](crate::export_plugins)
//! macro generates both symbols.

use crate::exports::PluginExport;

/// Version of the plugin library contract. Bumped on any change to the
/// exported symbols or to the [`Plugin`](crate::traits::Plugin) trait.
pub const QUILL_PLUGIN_ABI_VERSION: u32 = 1;

/// Name of the ABI version symbol.
///
/// ```c
/// uint32_t quill_plugin_abi_version(void);
/// ```
pub const ABI_VERSION_SYMBOL: &[u8] = b"quill_plugin_abi_version";

/// Name of the entry point returning every plugin in the library.
pub const ENTRY_SYMBOL: &[u8] = b"quill_plugin_entry";

/// Type of the ABI version symbol.
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// Type of the entry point symbol. Rust ABI: only called after the
/// version check passed.
pub type PluginEntryFn = unsafe fn() -> PluginExport;
