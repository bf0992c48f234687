//! Service registry: named service instances keyed by service type.
//!
//! Several instances of the same service type may be registered at once
//! (for example one `Formatter` per language plugin). Every entry records
//! the plugin that registered it so the host can purge by owner.

use std::any::{Any, TypeId, type_name};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::hooks::cleanup::CleanupHook;

/// Identifier of one registered service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(Uuid);

impl ServiceId {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Entry in the service registry.
struct ServiceEntry {
    /// Registration id.
    id: ServiceId,
    /// Instance name, unique only for display purposes.
    name: String,
    /// Plugin that registered this instance.
    owner: String,
    /// The instance, type-erased.
    instance: Arc<dyn Any + Send + Sync>,
}

/// A resolved service instance.
#[derive(Debug)]
pub struct ServiceInstance<T: ?Sized> {
    /// Registration id.
    pub id: ServiceId,
    /// Instance name.
    pub name: String,
    /// Plugin that registered the instance.
    pub owner: String,
    /// The instance.
    pub instance: Arc<T>,
}

/// Registry of plugin-provided services organized by service type.
#[derive(Default)]
pub struct ServiceRegistry {
    /// Service type → instances in registration order.
    services: DashMap<TypeId, Vec<ServiceEntry>>,
}

impl ServiceRegistry {
    /// Creates a new empty service registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service instance owned by `owner`.
    pub fn register<T>(&self, owner: &str, name: &str, instance: Arc<T>) -> ServiceId
    where
        T: Any + Send + Sync,
    {
        let id = ServiceId::new();
        self.services
            .entry(TypeId::of::<T>())
            .or_default()
            .push(ServiceEntry {
                id,
                name: name.to_string(),
                owner: owner.to_string(),
                instance,
            });

        info!(
            service = type_name::<T>(),
            name = %name,
            plugin_id = %owner,
            "Service registered"
        );
        id
    }

    /// Removes a single registration. Returns whether it existed.
    pub fn unregister(&self, id: ServiceId) -> bool {
        let mut removed = false;
        for mut entries in self.services.iter_mut() {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            removed |= entries.len() != before;
        }
        self.services.retain(|_, entries| !entries.is_empty());

        if removed {
            debug!(service_id = %id, "Service unregistered");
        }
        removed
    }

    /// Removes a single registration if `owner` made it.
    pub fn unregister_owned(&self, owner: &str, id: ServiceId) -> bool {
        let mut removed = false;
        for mut entries in self.services.iter_mut() {
            let before = entries.len();
            entries.retain(|e| e.id != id || e.owner != owner);
            removed |= entries.len() != before;
        }
        self.services.retain(|_, entries| !entries.is_empty());

        if removed {
            debug!(service_id = %id, plugin_id = %owner, "Service unregistered");
        } else {
            debug!(service_id = %id, plugin_id = %owner, "No such service owned by plugin");
        }
        removed
    }

    /// Returns every registered instance of service type `T`.
    pub fn get_all<T>(&self) -> Vec<ServiceInstance<T>>
    where
        T: Any + Send + Sync,
    {
        self.services
            .get(&TypeId::of::<T>())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| {
                        e.instance
                            .clone()
                            .downcast::<T>()
                            .ok()
                            .map(|instance| ServiceInstance {
                                id: e.id,
                                name: e.name.clone(),
                                owner: e.owner.clone(),
                                instance,
                            })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the first instance of `T` registered under `name`.
    pub fn get_named<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.get_all::<T>()
            .into_iter()
            .find(|s| s.name == name)
            .map(|s| s.instance)
    }

    /// Returns the number of registrations owned by `owner`.
    pub fn count_for_owner(&self, owner: &str) -> usize {
        self.services
            .iter()
            .map(|entries| entries.iter().filter(|e| e.owner == owner).count())
            .sum()
    }

    /// Returns the total number of registrations.
    pub fn len(&self) -> usize {
        self.services.iter().map(|entries| entries.len()).sum()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every registration owned by `owner`.
    pub fn unregister_owner(&self, owner: &str) -> usize {
        let mut removed = 0;
        for mut entries in self.services.iter_mut() {
            let before = entries.len();
            entries.retain(|e| e.owner != owner);
            removed += before - entries.len();
        }
        self.services.retain(|_, entries| !entries.is_empty());
        removed
    }
}

impl CleanupHook for ServiceRegistry {
    fn name(&self) -> &str {
        "services"
    }

    fn purge_owner(&self, owner: &str) {
        let removed = self.unregister_owner(owner);
        if removed > 0 {
            info!(plugin_id = %owner, removed, "Services unregistered for plugin");
        }
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("registrations", &self.len())
            .finish()
    }
}
