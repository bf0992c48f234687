//! Plugin system configuration.

use serde::{Deserialize, Serialize};

/// Plugin system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Directory containing plugin shared libraries.
    #[serde(default = "default_plugin_directory")]
    pub directory: String,
    /// Whether to discover and load external plugins on startup.
    #[serde(default = "default_true")]
    pub auto_load: bool,
    /// Whether to start plugins whose activation policy is `on_startup`.
    #[serde(default = "default_true")]
    pub auto_start: bool,
    /// Plugin identities the user has disabled.
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            directory: default_plugin_directory(),
            auto_load: true,
            auto_start: true,
            disabled: Vec::new(),
        }
    }
}

fn default_plugin_directory() -> String {
    "./plugins".to_string()
}

fn default_true() -> bool {
    true
}
