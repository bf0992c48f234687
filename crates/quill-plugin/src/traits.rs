//! The plugin behavior trait and the errors plugin code may report.

use thiserror::Error;

use crate::api::context::PluginContext;
use crate::containment::contain;
use crate::types::{ActivationPolicy, PluginMetadata, RestartPolicy};

/// Failure reported by plugin code.
///
/// The host never propagates these: it records the message on the
/// plugin's record and moves the plugin to `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    /// The plugin could not activate.
    #[error("activation failed: {0}")]
    Activation(String),
    /// The plugin could not deactivate cleanly.
    #[error("deactivation failed: {0}")]
    Deactivation(String),
    /// A host service the plugin depends on is not available.
    #[error("missing host service: {0}")]
    MissingService(String),
    /// A registration was attempted while the plugin was not active.
    #[error("plugin '{0}' is not active; registration rejected")]
    RegistrationClosed(String),
    /// Plugin code panicked; produced by the host, not by plugins.
    #[error("plugin panicked: {0}")]
    Panicked(String),
    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl PluginError {
    /// Creates an activation error.
    pub fn activation(message: impl Into<String>) -> Self {
        Self::Activation(message.into())
    }

    /// Creates a deactivation error.
    pub fn deactivation(message: impl Into<String>) -> Self {
        Self::Deactivation(message.into())
    }
}

/// Trait that all plugins must implement.
///
/// The host holds the only owning reference to a plugin. Activation and
/// deactivation are expected to be synchronous and fast; slow work belongs
/// on a thread or task the plugin spawns after `activate` returns.
pub trait Plugin: Send {
    /// Returns plugin metadata. Called once, at load time.
    fn describe(&self) -> PluginMetadata;

    /// Activates the plugin, registering its capabilities through `ctx`.
    fn activate(&mut self, ctx: &mut PluginContext) -> Result<(), PluginError>;

    /// Deactivates the plugin. Registrations made through the context are
    /// purged by the host afterwards, so plugins need not undo them here.
    fn deactivate(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Whether the plugin should start automatically.
    fn activation_policy(&self) -> ActivationPolicy {
        ActivationPolicy::OnStartup
    }

    /// Whether re-enabling after a disable requires a host restart.
    fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy::Live
    }
}

impl std::fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match contain(|| self.describe()) {
            Ok(meta) => f
                .debug_struct("Plugin")
                .field("id", &meta.id)
                .field("version", &meta.version)
                .finish(),
            Err(panic) => f.debug_struct("Plugin").field("describe_panicked", &panic).finish(),
        }
    }
}
