//! Panic containment for calls into plugin-supplied code.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Runs `f`, converting a panic into an `Err` carrying the panic message.
///
/// Plugin state touched by a panicking call is never reused: the host
/// marks the plugin `Failed` and purges its registrations.
pub(crate) fn contain<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
