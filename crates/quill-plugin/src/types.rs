//! Value types describing plugins: metadata, state, origin, policies, and
//! the read-only snapshots handed out by the manager.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable, host-unique plugin identity.
pub type PluginId = String;

/// Metadata a plugin declares about itself.
///
/// Captured once at load time and immutable for the life of the loaded record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Unique plugin identifier.
    pub id: PluginId,
    /// Human-readable plugin name.
    pub name: String,
    /// Plugin version string.
    pub version: String,
    /// Plugin description.
    #[serde(default)]
    pub description: String,
}

impl PluginMetadata {
    /// Creates metadata with an empty description.
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Lifecycle state of a loaded plugin.
///
/// `Loaded` and `Stopped` are both inactive; `Loaded` is the only state
/// that has never been started. There is no terminal state: unloading
/// removes the record instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    /// Loaded and never started.
    Loaded,
    /// Activated successfully.
    Started,
    /// Deactivated, or forced inactive by a stop request.
    Stopped,
    /// The last transition attempt failed.
    Failed,
}

impl PluginState {
    /// Whether the plugin is currently active.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Started)
    }

    /// Returns the state as a lowercase string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a plugin was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginOrigin {
    /// Compiled into the host binary.
    Builtin,
    /// Loaded from an external shared library.
    External,
}

impl fmt::Display for PluginOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => write!(f, "builtin"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Whether a plugin should be started automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationPolicy {
    /// Started by [`PluginManager::start_auto`](crate::manager::PluginManager::start_auto).
    #[default]
    OnStartup,
    /// Started only on explicit request.
    Manual,
}

/// Whether disabling a plugin requires a host restart to re-enable it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Can be stopped and started again at any time.
    #[default]
    Live,
    /// Once activated and then disabled, re-enabling needs a restart.
    RequiresRestart,
}

/// Immutable snapshot of a loaded plugin, safe to hand to UI code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSnapshot {
    /// Plugin identity.
    pub id: PluginId,
    /// Display name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Description.
    pub description: String,
    /// Where the plugin came from.
    pub origin: PluginOrigin,
    /// Current lifecycle state.
    pub state: PluginState,
    /// Source path hint for display, if any.
    pub source_path: Option<PathBuf>,
    /// Message of the last failed transition.
    pub last_error: Option<String>,
    /// Declared activation policy.
    pub activation_policy: ActivationPolicy,
    /// Declared restart policy.
    pub restart_policy: RestartPolicy,
    /// When the plugin was loaded.
    pub loaded_at: DateTime<Utc>,
    /// When the state last changed.
    pub state_changed_at: DateTime<Utc>,
}

impl PluginSnapshot {
    /// Whether the snapshot was taken while the plugin was active.
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_started_is_active() {
        assert!(PluginState::Started.is_active());
        assert!(!PluginState::Loaded.is_active());
        assert!(!PluginState::Stopped.is_active());
        assert!(!PluginState::Failed.is_active());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&PluginState::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
        let policy = serde_json::to_string(&RestartPolicy::RequiresRestart).unwrap();
        assert_eq!(policy, "\"requires_restart\"");
    }

    #[test]
    fn test_metadata_builder() {
        let meta = PluginMetadata::new("markdown", "Markdown", "1.2.0")
            .with_description("Markdown editing support");
        assert_eq!(meta.id, "markdown");
        assert_eq!(meta.description, "Markdown editing support");
    }
}
