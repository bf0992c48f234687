//! Plugin context: the per-plugin mediator between the host and a
//! plugin's activation calls, and the plugin's registration surface.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::containment::contain;
use crate::registry::contributions::DEFAULT_PRIORITY;
use crate::registry::{
    Contribution, ContributionRegistry, ServiceId, ServiceInstance, ServiceRegistry, StringTable,
};
use crate::traits::{Plugin, PluginError};

/// Owner-tagged handle onto the host's capability tables.
///
/// Cloneable so a plugin can hand it to background work. Registrations are
/// accepted only while the owning plugin is active; once it stops or fails
/// they are rejected with [`PluginError::RegistrationClosed`].
///
/// A registration holds the read side of the open flag across its insert,
/// and closing takes the write side. Once closing returns, no insert is in
/// flight, so the owner purge that follows sees every entry.
#[derive(Clone)]
pub struct Registrar {
    /// Owning plugin id.
    owner: Arc<str>,
    /// Whether registrations are currently accepted.
    open: Arc<RwLock<bool>>,
    /// Service table.
    services: Arc<ServiceRegistry>,
    /// UI contribution table.
    contributions: Arc<ContributionRegistry>,
    /// Locale string overrides.
    strings: Arc<StringTable>,
}

impl Registrar {
    pub(crate) fn new(
        owner: &str,
        services: Arc<ServiceRegistry>,
        contributions: Arc<ContributionRegistry>,
        strings: Arc<StringTable>,
    ) -> Self {
        Self {
            owner: Arc::from(owner),
            open: Arc::new(RwLock::new(false)),
            services,
            contributions,
            strings,
        }
    }

    /// Returns the owning plugin id.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Whether registrations are currently accepted.
    pub fn is_open(&self) -> bool {
        *self.open.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until no registration is in flight.
    fn set_open(&self, open: bool) {
        *self.open.write().unwrap_or_else(PoisonError::into_inner) = open;
    }

    /// Runs `insert` while registrations are held open.
    fn while_open<R>(&self, insert: impl FnOnce() -> R) -> Result<R, PluginError> {
        let open = self.open.read().unwrap_or_else(PoisonError::into_inner);
        if !*open {
            warn!(plugin_id = %self.owner, "Registration attempted while plugin is inactive");
            return Err(PluginError::RegistrationClosed(self.owner.to_string()));
        }
        Ok(insert())
    }

    /// Registers a named service instance of type `T`.
    pub fn register_service<T>(
        &self,
        name: &str,
        instance: Arc<T>,
    ) -> Result<ServiceId, PluginError>
    where
        T: Any + Send + Sync,
    {
        self.while_open(|| self.services.register(&self.owner, name, instance))
    }

    /// Removes one of this plugin's service registrations.
    ///
    /// Ids registered by other plugins are left alone and yield `false`.
    pub fn unregister_service(&self, id: ServiceId) -> bool {
        self.services.unregister_owned(&self.owner, id)
    }

    /// Looks up every registered instance of service type `T`, from any plugin.
    pub fn services<T>(&self) -> Vec<ServiceInstance<T>>
    where
        T: Any + Send + Sync,
    {
        self.services.get_all::<T>()
    }

    /// Adds a UI contribution at the default priority.
    pub fn contribute(&self, contribution: Contribution) -> Result<(), PluginError> {
        self.contribute_with_priority(contribution, DEFAULT_PRIORITY)
    }

    /// Adds a UI contribution at an explicit priority (lower = earlier).
    pub fn contribute_with_priority(
        &self,
        contribution: Contribution,
        priority: i32,
    ) -> Result<(), PluginError> {
        self.while_open(|| self.contributions.contribute(&self.owner, contribution, priority))
    }

    /// Overrides a locale string.
    pub fn override_string(&self, key: &str, value: &str) -> Result<(), PluginError> {
        self.while_open(|| self.strings.set(&self.owner, key, value))
    }
}

impl std::fmt::Debug for Registrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registrar")
            .field("owner", &self.owner)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Type map of host services injected by context initializers.
#[derive(Default)]
struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send>>,
}

/// Context given to a plugin, one per loaded plugin.
///
/// Created once at load time and never replaced. Activation and
/// deactivation are idempotent: a second `activate` while active does not
/// re-enter the plugin.
pub struct PluginContext {
    /// Plugin identity.
    plugin_id: String,
    /// Whether the plugin is currently active.
    active: bool,
    /// Owner-tagged registration surface.
    registrar: Registrar,
    /// Host services injected by context initializers.
    extensions: Extensions,
}

impl PluginContext {
    pub(crate) fn new(plugin_id: &str, registrar: Registrar) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            active: false,
            registrar,
            extensions: Extensions::default(),
        }
    }

    /// Returns the plugin identity.
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Whether the plugin is currently active.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Activates `plugin` unless it is already active.
    ///
    /// Panics raised by the plugin are contained and reported as
    /// [`PluginError::Panicked`]. On failure registrations are closed again.
    pub fn activate(&mut self, plugin: &mut dyn Plugin) -> Result<(), PluginError> {
        if self.active {
            debug!(plugin_id = %self.plugin_id, "Activate ignored, already active");
            return Ok(());
        }

        self.registrar.set_open(true);
        let outcome = contain(|| plugin.activate(self))
            .unwrap_or_else(|panic| Err(PluginError::Panicked(panic)));

        match outcome {
            Ok(()) => {
                self.active = true;
                Ok(())
            }
            Err(e) => {
                self.registrar.set_open(false);
                Err(e)
            }
        }
    }

    /// Deactivates `plugin` if it is active.
    ///
    /// Registrations close before the plugin's `deactivate` runs, so nothing
    /// new can be registered during teardown.
    pub fn deactivate(&mut self, plugin: &mut dyn Plugin) -> Result<(), PluginError> {
        if !self.active {
            debug!(plugin_id = %self.plugin_id, "Deactivate ignored, not active");
            return Ok(());
        }

        self.active = false;
        self.registrar.set_open(false);
        contain(|| plugin.deactivate()).unwrap_or_else(|panic| Err(PluginError::Panicked(panic)))
    }

    /// Returns a cloneable registration handle for background work.
    pub fn registrar(&self) -> Registrar {
        self.registrar.clone()
    }

    /// Registers a named service instance of type `T`.
    pub fn register_service<T>(
        &self,
        name: &str,
        instance: Arc<T>,
    ) -> Result<ServiceId, PluginError>
    where
        T: Any + Send + Sync,
    {
        self.registrar.register_service(name, instance)
    }

    /// Removes one of this plugin's service registrations.
    pub fn unregister_service(&self, id: ServiceId) -> bool {
        self.registrar.unregister_service(id)
    }

    /// Looks up every registered instance of service type `T`.
    pub fn services<T>(&self) -> Vec<ServiceInstance<T>>
    where
        T: Any + Send + Sync,
    {
        self.registrar.services::<T>()
    }

    /// Adds a UI contribution at the default priority.
    pub fn contribute(&self, contribution: Contribution) -> Result<(), PluginError> {
        self.registrar.contribute(contribution)
    }

    /// Adds a UI contribution at an explicit priority.
    pub fn contribute_with_priority(
        &self,
        contribution: Contribution,
        priority: i32,
    ) -> Result<(), PluginError> {
        self.registrar.contribute_with_priority(contribution, priority)
    }

    /// Overrides a locale string.
    pub fn override_string(&self, key: &str, value: &str) -> Result<(), PluginError> {
        self.registrar.override_string(key, value)
    }

    /// Injects a host service. Replaces any previous value of the same type.
    pub fn insert_extension<T: Any + Send>(&mut self, value: T) {
        self.extensions.map.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Returns an injected host service.
    pub fn extension<T: Any + Send>(&self) -> Option<&T> {
        self.extensions
            .map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Returns an injected host service or a [`PluginError::MissingService`].
    pub fn require_extension<T: Any + Send>(&self) -> Result<&T, PluginError> {
        self.extension::<T>()
            .ok_or_else(|| PluginError::MissingService(std::any::type_name::<T>().to_string()))
    }

    /// Whether a host service of type `T` was injected.
    pub fn has_extension<T: Any + Send>(&self) -> bool {
        self.extensions.map.contains_key(&TypeId::of::<T>())
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_id", &self.plugin_id)
            .field("active", &self.active)
            .field("extensions", &self.extensions.map.len())
            .finish()
    }
}
