//! Discovery: the collaborator that finds plugins and hands them to the
//! manager.
//!
//! The manager never walks a filesystem or opens a library itself; it
//! only consumes [`DiscoveryResult`]s produced by a [`Discovery`].

use std::path::PathBuf;

use quill_core::result::AppResult;

use crate::execution::{ExecutionContextHandle, ReleaseAction};
use crate::traits::Plugin;
use crate::types::PluginOrigin;

/// One discovered plugin, ready to be loaded.
pub struct DiscoveredUnit {
    /// The plugin behavior.
    pub plugin: Box<dyn Plugin>,
    /// Where the plugin came from.
    pub origin: PluginOrigin,
    /// Source path hint for display.
    pub source_path: Option<PathBuf>,
    /// The code unit the plugin was loaded from.
    pub handle: ExecutionContextHandle,
    /// Releases `handle` once no loaded plugin holds it.
    pub release: Option<ReleaseAction>,
}

impl DiscoveredUnit {
    /// Creates a unit with no source path and no release action.
    pub fn new(
        plugin: Box<dyn Plugin>,
        origin: PluginOrigin,
        handle: ExecutionContextHandle,
    ) -> Self {
        Self {
            plugin,
            origin,
            source_path: None,
            handle,
            release: None,
        }
    }

    /// Sets the source path hint.
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Attaches the release action for the unit's handle.
    pub fn with_release(mut self, release: ReleaseAction) -> Self {
        self.release = Some(release);
        self
    }
}

impl std::fmt::Debug for DiscoveredUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveredUnit")
            .field("plugin", &self.plugin)
            .field("origin", &self.origin)
            .field("source_path", &self.source_path)
            .field("handle", &self.handle)
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

/// An ordered batch of discovered units.
#[derive(Debug, Default)]
pub struct DiscoveryResult {
    units: Vec<DiscoveredUnit>,
}

impl DiscoveryResult {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a unit.
    pub fn push(&mut self, unit: DiscoveredUnit) {
        self.units.push(unit);
    }

    /// Appends every unit of another result, preserving order.
    pub fn extend(&mut self, other: DiscoveryResult) {
        self.units.extend(other.units);
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether no units were discovered.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Iterates over the units.
    pub fn iter(&self) -> impl Iterator<Item = &DiscoveredUnit> {
        self.units.iter()
    }
}

impl From<Vec<DiscoveredUnit>> for DiscoveryResult {
    fn from(units: Vec<DiscoveredUnit>) -> Self {
        Self { units }
    }
}

impl IntoIterator for DiscoveryResult {
    type Item = DiscoveredUnit;
    type IntoIter = std::vec::IntoIter<DiscoveredUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.into_iter()
    }
}

/// Something that can find plugins.
pub trait Discovery {
    /// Produces the plugins currently available, in a stable order.
    fn discover(&mut self) -> AppResult<DiscoveryResult>;
}

/// Factory producing a fresh built-in plugin instance.
pub type PluginFactory = Box<dyn Fn() -> Box<dyn Plugin> + Send>;

/// Discovery of plugins compiled into the host binary.
///
/// All built-in plugins share one execution context (the host binary),
/// which has no release action.
pub struct BuiltinDiscovery {
    handle: ExecutionContextHandle,
    factories: Vec<PluginFactory>,
}

impl BuiltinDiscovery {
    /// Creates an empty built-in discovery.
    pub fn new() -> Self {
        Self {
            handle: ExecutionContextHandle::new("builtin"),
            factories: Vec::new(),
        }
    }

    /// Adds a plugin factory.
    pub fn register<F>(&mut self, factory: F)
    where
        F: Fn() -> Box<dyn Plugin> + Send + 'static,
    {
        self.factories.push(Box::new(factory));
    }

    /// Adds a plugin factory, builder-style.
    pub fn with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Plugin> + Send + 'static,
    {
        self.register(factory);
        self
    }

    /// Returns the shared handle of built-in plugins.
    pub fn handle(&self) -> &ExecutionContextHandle {
        &self.handle
    }
}

impl Default for BuiltinDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl Discovery for BuiltinDiscovery {
    fn discover(&mut self) -> AppResult<DiscoveryResult> {
        Ok(self
            .factories
            .iter()
            .map(|factory| {
                DiscoveredUnit::new(factory(), PluginOrigin::Builtin, self.handle.clone())
            })
            .collect::<Vec<_>>()
            .into())
    }
}

impl std::fmt::Debug for BuiltinDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinDiscovery")
            .field("handle", &self.handle)
            .field("factories", &self.factories.len())
            .finish()
    }
}

/// Several discoveries run in sequence, results concatenated in order.
#[derive(Default)]
pub struct DiscoveryChain {
    sources: Vec<Box<dyn Discovery + Send>>,
}

impl DiscoveryChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a source, builder-style.
    pub fn with(mut self, source: impl Discovery + Send + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl Discovery for DiscoveryChain {
    fn discover(&mut self) -> AppResult<DiscoveryResult> {
        let mut result = DiscoveryResult::new();
        for source in &mut self.sources {
            result.extend(source.discover()?);
        }
        Ok(result)
    }
}

impl std::fmt::Debug for DiscoveryChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryChain")
            .field("sources", &self.sources.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::context::PluginContext;
    use crate::traits::PluginError;
    use crate::types::PluginMetadata;

    struct Named(&'static str);

    impl Plugin for Named {
        fn describe(&self) -> PluginMetadata {
            PluginMetadata::new(self.0, self.0, "1.0.0")
        }

        fn activate(&mut self, _ctx: &mut PluginContext) -> Result<(), PluginError> {
            Ok(())
        }
    }

    #[test]
    fn test_builtin_units_share_one_handle() {
        let mut discovery = BuiltinDiscovery::new()
            .with(|| Box::new(Named("markdown")))
            .with(|| Box::new(Named("word-count")));

        let result = discovery.discover().unwrap();
        let units: Vec<_> = result.into_iter().collect();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].plugin.describe().id, "markdown");
        assert_eq!(units[0].handle, units[1].handle);
        assert!(units.iter().all(|u| u.release.is_none()));
        assert!(units.iter().all(|u| u.origin == PluginOrigin::Builtin));
    }

    #[test]
    fn test_rediscovery_yields_fresh_instances_same_handle() {
        let mut discovery = BuiltinDiscovery::new().with(|| Box::new(Named("markdown")));
        let first = discovery.discover().unwrap();
        let second = discovery.discover().unwrap();

        let a = first.iter().next().unwrap();
        let b = second.iter().next().unwrap();
        assert_eq!(a.handle, b.handle);
        assert_eq!(&a.handle, discovery.handle());
    }

    #[test]
    fn test_chain_keeps_source_order() {
        let mut chain = DiscoveryChain::new()
            .with(BuiltinDiscovery::new().with(|| Box::new(Named("first"))))
            .with(BuiltinDiscovery::new().with(|| Box::new(Named("second"))));

        let ids: Vec<_> = chain
            .discover()
            .unwrap()
            .into_iter()
            .map(|u| u.plugin.describe().id)
            .collect();
        assert_eq!(ids, vec!["first", "second"]);
    }
}
