//! Execution contexts: the loaded code units plugins come from.
//!
//! One shared library (or the host binary itself) may contribute several
//! plugins. Each loaded plugin retains the handle of the unit it came from;
//! the unit's release action runs exactly once, when the last plugin
//! holding it is unloaded.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::containment::contain;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque token identifying one loaded code unit.
///
/// Equality and hashing use a process-unique id only, so two handles with
/// the same label are still distinct units.
#[derive(Clone)]
pub struct ExecutionContextHandle {
    id: u64,
    label: Arc<str>,
}

impl ExecutionContextHandle {
    /// Allocates a new, distinct handle.
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            label: label.into(),
        }
    }

    /// Returns the numeric identity of this handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the display label (usually a library path).
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl PartialEq for ExecutionContextHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ExecutionContextHandle {}

impl Hash for ExecutionContextHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ExecutionContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContextHandle")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

impl fmt::Display for ExecutionContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.label, self.id)
    }
}

/// Failure reported by a release action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("release of execution context failed: {0}")]
pub struct ReleaseError(pub String);

impl ReleaseError {
    /// Creates a release error.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Action that releases a code unit (closes a library, frees an arena...).
pub type ReleaseAction = Box<dyn FnOnce() -> Result<(), ReleaseError> + Send>;

/// Per-handle bookkeeping.
struct ContextEntry {
    /// Number of loaded plugins holding the handle.
    count: usize,
    /// Release action, recorded by the first retain that supplied one.
    release: Option<ReleaseAction>,
}

/// Reference counts for execution contexts, keyed by handle identity.
#[derive(Default)]
pub struct ExecutionContextRegistry {
    entries: HashMap<ExecutionContextHandle, ContextEntry>,
}

impl ExecutionContextRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the count for `handle`.
    ///
    /// The first action supplied for a handle is remembered; later ones are
    /// dropped without being invoked.
    pub fn retain(&mut self, handle: &ExecutionContextHandle, release: Option<ReleaseAction>) {
        let entry = self
            .entries
            .entry(handle.clone())
            .or_insert_with(|| ContextEntry {
                count: 0,
                release: None,
            });

        entry.count += 1;
        if entry.release.is_none() {
            entry.release = release;
        }

        debug!(handle = %handle, count = entry.count, "Execution context retained");
    }

    /// Decrements the count for `handle`, releasing it at zero.
    ///
    /// Returns `true` if this call released the handle.
    pub fn release(&mut self, handle: &ExecutionContextHandle) -> bool {
        let Some(entry) = self.entries.get_mut(handle) else {
            warn!(handle = %handle, "Release of an execution context that is not retained");
            return false;
        };

        entry.count -= 1;
        debug!(handle = %handle, count = entry.count, "Execution context released");

        if entry.count > 0 {
            return false;
        }

        if let Some(entry) = self.entries.remove(handle) {
            if let Some(action) = entry.release {
                Self::release_now(handle, action);
            } else {
                info!(handle = %handle, "Execution context dropped (no release action)");
            }
        }
        true
    }

    /// Invokes a release action immediately, containing errors and panics.
    ///
    /// Used for handles that never got retained (every plugin they carried
    /// was rejected).
    pub fn release_now(handle: &ExecutionContextHandle, action: ReleaseAction) {
        match contain(action) {
            Ok(Ok(())) => info!(handle = %handle, "Execution context released"),
            Ok(Err(e)) => warn!(handle = %handle, error = %e, "Release action failed"),
            Err(panic) => warn!(handle = %handle, panic = %panic, "Release action panicked"),
        }
    }

    /// Returns the number of plugins holding `handle`.
    pub fn ref_count(&self, handle: &ExecutionContextHandle) -> usize {
        self.entries.get(handle).map(|e| e.count).unwrap_or(0)
    }

    /// Whether any plugin holds `handle`.
    pub fn is_retained(&self, handle: &ExecutionContextHandle) -> bool {
        self.entries.contains_key(handle)
    }

    /// Number of distinct retained handles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no handle is retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ExecutionContextRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(h, e)| (h.to_string(), e.count)))
            .finish()
    }
}
