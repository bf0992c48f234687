//! Cleanup hooks: purge a plugin's registrations from every host table.

pub mod cleanup;

pub use cleanup::{CleanupHook, CleanupHooks};
