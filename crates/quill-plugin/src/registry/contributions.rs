//! Contribution registry: UI contributions organized by kind with
//! priority ordering.
//!
//! The UI shell reads this table to build toolbars, pick file handlers,
//! and apply syntax rules. Entries are tagged with the contributing plugin
//! at insertion time.

use std::fmt;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::hooks::cleanup::CleanupHook;

/// Kinds of UI contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionKind {
    /// A toolbar button.
    ToolbarItem,
    /// A handler for opening files with given extensions.
    FileHandler,
    /// A syntax highlighting rule.
    SyntaxRule,
}

impl fmt::Display for ContributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolbarItem => write!(f, "toolbar_item"),
            Self::FileHandler => write!(f, "file_handler"),
            Self::SyntaxRule => write!(f, "syntax_rule"),
        }
    }
}

/// A single UI contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Contribution {
    /// A toolbar button that triggers a command.
    ToolbarItem {
        /// Stable item id.
        id: String,
        /// Button label (a string-table key or literal text).
        label: String,
        /// Command invoked on click.
        command: String,
    },
    /// Opens files with the given extensions.
    FileHandler {
        /// Stable handler id.
        id: String,
        /// Lowercase extensions without the leading dot.
        extensions: Vec<String>,
    },
    /// Highlights matches of a pattern with a theme scope.
    SyntaxRule {
        /// Language the rule applies to.
        language: String,
        /// Pattern source, interpreted by the highlighter.
        pattern: String,
        /// Theme scope applied to matches.
        scope: String,
    },
}

impl Contribution {
    /// Returns the kind of this contribution.
    pub fn kind(&self) -> ContributionKind {
        match self {
            Self::ToolbarItem { .. } => ContributionKind::ToolbarItem,
            Self::FileHandler { .. } => ContributionKind::FileHandler,
            Self::SyntaxRule { .. } => ContributionKind::SyntaxRule,
        }
    }
}

/// A contribution together with its owner and priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionEntry {
    /// The contribution.
    pub contribution: Contribution,
    /// Priority (lower = earlier).
    pub priority: i32,
    /// Plugin that contributed this entry.
    pub plugin_id: String,
}

/// Default contribution priority.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Registry of UI contributions organized by kind.
#[derive(Debug, Default)]
pub struct ContributionRegistry {
    /// Kind → entries sorted by priority.
    entries: DashMap<ContributionKind, Vec<ContributionEntry>>,
}

impl ContributionRegistry {
    /// Creates a new empty contribution registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a contribution owned by `plugin_id`.
    pub fn contribute(&self, plugin_id: &str, contribution: Contribution, priority: i32) {
        let kind = contribution.kind();
        let mut entries = self.entries.entry(kind).or_default();

        entries.push(ContributionEntry {
            contribution,
            priority,
            plugin_id: plugin_id.to_string(),
        });

        // Stable sort keeps registration order among equal priorities
        entries.sort_by_key(|e| e.priority);

        info!(
            kind = %kind,
            plugin_id = %plugin_id,
            priority = priority,
            "Contribution registered"
        );
    }

    /// Returns all contributions of a kind, sorted by priority.
    pub fn list(&self, kind: ContributionKind) -> Vec<ContributionEntry> {
        self.entries
            .get(&kind)
            .map(|entries| entries.value().clone())
            .unwrap_or_default()
    }

    /// Returns the file handlers that accept `extension`, best first.
    pub fn file_handlers_for(&self, extension: &str) -> Vec<ContributionEntry> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self.list(ContributionKind::FileHandler)
            .into_iter()
            .filter(|entry| match &entry.contribution {
                Contribution::FileHandler { extensions, .. } => {
                    extensions.iter().any(|e| *e == extension)
                }
                _ => false,
            })
            .collect()
    }

    /// Returns the number of contributions owned by `plugin_id`.
    pub fn count_for_owner(&self, plugin_id: &str) -> usize {
        self.entries
            .iter()
            .map(|entries| entries.iter().filter(|e| e.plugin_id == plugin_id).count())
            .sum()
    }

    /// Removes all contributions of a plugin.
    pub fn unregister_owner(&self, plugin_id: &str) -> usize {
        let mut removed = 0;
        for mut entries in self.entries.iter_mut() {
            let before = entries.len();
            entries.retain(|e| e.plugin_id != plugin_id);
            removed += before - entries.len();
        }

        // Remove empty kinds
        self.entries.retain(|_, entries| !entries.is_empty());
        removed
    }
}

impl CleanupHook for ContributionRegistry {
    fn name(&self) -> &str {
        "contributions"
    }

    fn purge_owner(&self, owner: &str) {
        let removed = self.unregister_owner(owner);
        if removed > 0 {
            info!(plugin_id = %owner, removed, "All contributions unregistered for plugin");
        }
    }
}
