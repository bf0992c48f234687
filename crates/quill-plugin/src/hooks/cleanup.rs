//! The cleanup hook set run whenever a plugin stops, fails, or unloads.
//!
//! The set is fixed once the manager is built: built-in registries first,
//! then host-supplied hooks in the order they were added.

use std::sync::Arc;

use tracing::debug;

/// A host-side "remove everything owned by this plugin" operation.
///
/// Implementations must be total: the manager does not guard individual
/// hook invocations, so a hook that can fail must handle it internally.
pub trait CleanupHook: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Removes every entry owned by `owner`.
    fn purge_owner(&self, owner: &str);
}

/// Ordered, immutable list of cleanup hooks.
#[derive(Clone, Default)]
pub struct CleanupHooks {
    hooks: Vec<Arc<dyn CleanupHook>>,
}

impl CleanupHooks {
    /// Creates a hook set from an ordered list.
    pub fn new(hooks: Vec<Arc<dyn CleanupHook>>) -> Self {
        Self { hooks }
    }

    /// Runs every hook for `owner`, in order.
    pub fn run(&self, owner: &str) {
        for hook in &self.hooks {
            debug!(plugin_id = %owner, hook = hook.name(), "Running cleanup hook");
            hook.purge_owner(owner);
        }
    }

    /// Returns the hook names in execution order.
    pub fn names(&self) -> Vec<String> {
        self.hooks.iter().map(|h| h.name().to_string()).collect()
    }

    /// Returns the number of hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl std::fmt::Debug for CleanupHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl CleanupHook for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn purge_owner(&self, owner: &str) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{owner}", self.name));
        }
    }

    #[test]
    fn test_hooks_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks = CleanupHooks::new(vec![
            Arc::new(Recording { name: "first", log: log.clone() }),
            Arc::new(Recording { name: "second", log: log.clone() }),
        ]);

        hooks.run("markdown");

        assert_eq!(*log.lock().unwrap(), vec!["first:markdown", "second:markdown"]);
        assert_eq!(hooks.names(), vec!["first", "second"]);
    }
}
