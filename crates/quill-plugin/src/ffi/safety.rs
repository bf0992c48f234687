//! Guarded calls into a freshly opened plugin library.

use quill_core::error::AppError;
use quill_core::result::AppResult;

use super::abi::{AbiVersionFn, PluginEntryFn, QUILL_PLUGIN_ABI_VERSION};
use crate::containment::contain;
use crate::exports::PluginExport;

/// Checks a version reported by a library against the host's.
pub fn check_abi_version(source: &str, found: u32) -> AppResult<()> {
    if found == QUILL_PLUGIN_ABI_VERSION {
        Ok(())
    } else {
        Err(AppError::loader(format!(
            "'{source}' was built for plugin ABI {found}, host expects {QUILL_PLUGIN_ABI_VERSION}"
        )))
    }
}

/// Reads and checks the library's ABI version.
///
/// # Safety
/// `version_fn` must point to a function with the [`AbiVersionFn`]
/// signature inside a library that is still loaded.
pub unsafe fn negotiate(source: &str, version_fn: AbiVersionFn) -> AppResult<()> {
    // SAFETY: upheld by the caller.
    let found = unsafe { version_fn() };
    check_abi_version(source, found)
}

/// Calls the library's entry point, containing a panic.
///
/// # Safety
/// `entry` must point to a function with the [`PluginEntryFn`] signature,
/// compiled against this crate, inside a library that is still loaded and
/// whose ABI version was checked.
pub unsafe fn call_entry(source: &str, entry: PluginEntryFn) -> AppResult<PluginExport> {
    // SAFETY: upheld by the caller.
    contain(|| unsafe { entry() }).map_err(|panic| {
        AppError::loader(format!("'{source}' panicked in its entry point: {panic}"))
    })
}
