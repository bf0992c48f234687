//! The contract between the host and plugin shared libraries.

pub mod abi;
pub mod safety;

pub use abi::{
    ABI_VERSION_SYMBOL, AbiVersionFn, ENTRY_SYMBOL, PluginEntryFn, QUILL_PLUGIN_ABI_VERSION,
};
