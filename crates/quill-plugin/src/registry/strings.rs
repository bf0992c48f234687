//! Locale string overrides contributed by plugins.
//!
//! The latest override for a key wins. Purging a plugin restores whatever
//! override (if any) was shadowed by it.

use dashmap::DashMap;
use tracing::{debug, info};

use crate::hooks::cleanup::CleanupHook;

/// One override layer for a key.
#[derive(Debug, Clone)]
struct Override {
    owner: String,
    value: String,
}

/// Table of plugin-provided string overrides.
#[derive(Debug, Default)]
pub struct StringTable {
    /// Key → override stack, newest last.
    overrides: DashMap<String, Vec<Override>>,
}

impl StringTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes an override for `key` owned by `owner`.
    pub fn set(&self, owner: &str, key: &str, value: &str) {
        self.overrides
            .entry(key.to_string())
            .or_default()
            .push(Override {
                owner: owner.to_string(),
                value: value.to_string(),
            });
        debug!(plugin_id = %owner, key = %key, "String override registered");
    }

    /// Returns the effective override for `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.overrides
            .get(key)
            .and_then(|stack| stack.last().map(|o| o.value.clone()))
    }

    /// Returns the number of keys with at least one override.
    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    /// Whether no overrides are present.
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Removes every override owned by `owner`.
    pub fn unregister_owner(&self, owner: &str) -> usize {
        let mut removed = 0;
        for mut stack in self.overrides.iter_mut() {
            let before = stack.len();
            stack.retain(|o| o.owner != owner);
            removed += before - stack.len();
        }
        self.overrides.retain(|_, stack| !stack.is_empty());
        removed
    }
}

impl CleanupHook for StringTable {
    fn name(&self) -> &str {
        "strings"
    }

    fn purge_owner(&self, owner: &str) {
        let removed = self.unregister_owner(owner);
        if removed > 0 {
            info!(plugin_id = %owner, removed, "String overrides removed for plugin");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purge_restores_shadowed_override() {
        let table = StringTable::new();
        table.set("theme-pack", "menu.file", "Fichier");
        table.set("pirate-locale", "menu.file", "Treasure Chest");
        assert_eq!(table.get("menu.file").as_deref(), Some("Treasure Chest"));

        table.purge_owner("pirate-locale");
        assert_eq!(table.get("menu.file").as_deref(), Some("Fichier"));

        table.purge_owner("theme-pack");
        assert_eq!(table.get("menu.file"), None);
        assert!(table.is_empty());
    }
}
