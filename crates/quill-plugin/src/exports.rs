//! The bundle a plugin library hands to the host.

use crate::traits::Plugin;

/// Every plugin contributed by one library, in the order they should load.
#[derive(Debug, Default)]
pub struct PluginExport {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginExport {
    /// Creates an empty export.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a builder.
    pub fn builder() -> PluginExportBuilder {
        PluginExportBuilder::default()
    }

    /// Appends a plugin.
    pub fn push(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// Number of plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether the export carries no plugin.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Consumes the export.
    pub fn into_plugins(self) -> Vec<Box<dyn Plugin>> {
        self.plugins
    }
}

/// Builder for constructing plugin exports incrementally.
#[derive(Debug, Default)]
pub struct PluginExportBuilder {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginExportBuilder {
    /// Adds a plugin.
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Builds the final export.
    pub fn build(self) -> PluginExport {
        PluginExport {
            plugins: self.plugins,
        }
    }
}
