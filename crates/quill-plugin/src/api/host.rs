//! Host services the editor injects into every plugin context.

use serde::{Deserialize, Serialize};

/// Facts about the running editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorInfo {
    /// Product name.
    pub name: String,
    /// Product version.
    pub version: String,
    /// Spaces per tab in the editor's settings.
    pub tab_width: usize,
}

impl EditorInfo {
    /// Creates editor info with the default tab width of 4.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            tab_width: 4,
        }
    }

    /// Sets the tab width.
    pub fn with_tab_width(mut self, tab_width: usize) -> Self {
        self.tab_width = tab_width;
        self
    }
}
