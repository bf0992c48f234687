//! Plugin manager: lifecycle management for all plugins.
//!
//! The manager owns the plugin table, the context initializers, the
//! listeners and the execution context registry. Every mutating operation
//! takes `&mut self`, so calls are serialized by construction; to drive the
//! manager from several tasks, move it into a
//! [`PluginHostService`](crate::service::PluginHostService).

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::context::{PluginContext, Registrar};
use crate::api::events::PluginListener;
use crate::containment::contain;
use crate::discovery::{DiscoveredUnit, DiscoveryResult};
use crate::execution::{ExecutionContextHandle, ExecutionContextRegistry, ReleaseAction};
use crate::hooks::cleanup::{CleanupHook, CleanupHooks};
use crate::registry::{ContributionRegistry, ServiceRegistry, StringTable};
use crate::traits::Plugin;
use crate::types::{
    ActivationPolicy, PluginId, PluginMetadata, PluginOrigin, PluginSnapshot, PluginState,
    RestartPolicy,
};

/// Host callback run against every plugin context, e.g. to inject services.
pub type ContextInitializer = Box<dyn Fn(&mut PluginContext) + Send>;

/// Outcome of [`PluginManager::load_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Ids loaded, in discovery order.
    pub accepted: Vec<PluginId>,
    /// Ids (or handle labels, when no id could be read) rejected.
    pub rejected: Vec<String>,
    /// Labels of execution contexts released because nothing from them loaded.
    pub released: Vec<String>,
}

/// Outcome of [`PluginManager::enable`] and [`PluginManager::disable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    /// The change took effect.
    Applied,
    /// The plugin is enabled again but only a host restart can start it.
    RestartRequired,
    /// No plugin with that id is loaded.
    NotFound,
}

/// The live, mutable record of one loaded plugin.
struct PluginRecord {
    metadata: PluginMetadata,
    plugin: Box<dyn Plugin>,
    context: PluginContext,
    origin: PluginOrigin,
    source_path: Option<PathBuf>,
    handle: ExecutionContextHandle,
    state: PluginState,
    last_error: Option<String>,
    activation_policy: ActivationPolicy,
    restart_policy: RestartPolicy,
    loaded_at: DateTime<Utc>,
    state_changed_at: DateTime<Utc>,
    /// Whether `activate` ever succeeded in this session.
    ever_started: bool,
}

impl PluginRecord {
    fn set_state(&mut self, state: PluginState) {
        if self.state != state {
            self.state = state;
            self.state_changed_at = Utc::now();
        }
    }

    fn snapshot(&self) -> PluginSnapshot {
        PluginSnapshot {
            id: self.metadata.id.clone(),
            name: self.metadata.name.clone(),
            version: self.metadata.version.clone(),
            description: self.metadata.description.clone(),
            origin: self.origin,
            state: self.state,
            source_path: self.source_path.clone(),
            last_error: self.last_error.clone(),
            activation_policy: self.activation_policy,
            restart_policy: self.restart_policy,
            loaded_at: self.loaded_at,
            state_changed_at: self.state_changed_at,
        }
    }
}

/// Builder for [`PluginManager`].
///
/// Cleanup hooks are fixed once the manager is built.
#[derive(Default)]
pub struct PluginManagerBuilder {
    hooks: Vec<Arc<dyn CleanupHook>>,
    listeners: Vec<Box<dyn PluginListener>>,
    disabled: HashSet<PluginId>,
}

impl PluginManagerBuilder {
    /// Appends a host cleanup hook, run after the built-in registries.
    pub fn cleanup_hook(mut self, hook: Arc<dyn CleanupHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Registers a listener before any plugin is loaded.
    pub fn listener(mut self, listener: impl PluginListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Seeds the disabled set, usually from `PluginConfig::disabled`.
    pub fn disabled<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PluginId>,
    {
        self.disabled.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Builds the manager.
    pub fn build(self) -> PluginManager {
        let services = Arc::new(ServiceRegistry::new());
        let contributions = Arc::new(ContributionRegistry::new());
        let strings = Arc::new(StringTable::new());

        let mut hooks: Vec<Arc<dyn CleanupHook>> =
            vec![services.clone(), contributions.clone(), strings.clone()];
        hooks.extend(self.hooks);
        let cleanup = CleanupHooks::new(hooks);

        debug!(hooks = ?cleanup, "Plugin manager built");

        PluginManager {
            records: Vec::new(),
            services,
            contributions,
            strings,
            cleanup,
            contexts: ExecutionContextRegistry::new(),
            initializers: Vec::new(),
            listeners: self.listeners,
            disabled: self.disabled,
        }
    }
}

/// Manages the full lifecycle of plugins: load, start, stop, unload.
///
/// No error or panic raised by plugin code escapes a manager operation.
/// Failures surface only as [`PluginState::Failed`] plus a message on the
/// plugin's snapshot, or as a `false` return.
pub struct PluginManager {
    /// Loaded plugins in load order. Dropped before `contexts`.
    records: Vec<PluginRecord>,
    /// Service table.
    services: Arc<ServiceRegistry>,
    /// UI contribution table.
    contributions: Arc<ContributionRegistry>,
    /// Locale string overrides.
    strings: Arc<StringTable>,
    /// Fixed cleanup hook set.
    cleanup: CleanupHooks,
    /// Reference counts of loaded code units.
    contexts: ExecutionContextRegistry,
    /// Context initializers in registration order.
    initializers: Vec<ContextInitializer>,
    /// Listeners in registration order.
    listeners: Vec<Box<dyn PluginListener>>,
    /// Ids the user disabled.
    disabled: HashSet<PluginId>,
}

impl PluginManager {
    /// Creates a manager with only the built-in cleanup hooks.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Returns a builder.
    pub fn builder() -> PluginManagerBuilder {
        PluginManagerBuilder::default()
    }

    // ── Loading ──────────────────────────────────────────────────

    /// Loads one discovered plugin.
    ///
    /// A unit whose id is already loaded is rejected: it is dropped, its
    /// release action is not invoked and nothing else changes.
    pub fn load(&mut self, unit: DiscoveredUnit) -> bool {
        let DiscoveredUnit {
            plugin,
            origin,
            source_path,
            handle,
            release,
        } = unit;

        match self.insert_record(plugin, origin, source_path, &handle) {
            Ok(id) => {
                self.contexts.retain(&handle, release);
                self.notify_changed(&id);
                true
            }
            Err(_) => false,
        }
    }

    /// Loads a discovery batch in order.
    ///
    /// Release actions are settled per handle across the batch: the first
    /// action supplied for a handle travels with the first accepted unit of
    /// that handle. When no unit of a handle was accepted and the handle is
    /// not held by an earlier load, its action runs once, immediately.
    pub fn load_all(&mut self, result: DiscoveryResult) -> LoadReport {
        let mut units: Vec<DiscoveredUnit> = result.into_iter().collect();

        let mut pending: Vec<(ExecutionContextHandle, ReleaseAction)> = Vec::new();
        for unit in &mut units {
            let Some(action) = unit.release.take() else {
                continue;
            };
            if pending.iter().any(|(handle, _)| *handle == unit.handle) {
                debug!(handle = %unit.handle, "Duplicate release action dropped");
            } else {
                pending.push((unit.handle.clone(), action));
            }
        }

        let mut report = LoadReport::default();
        for unit in units {
            let DiscoveredUnit {
                plugin,
                origin,
                source_path,
                handle,
                ..
            } = unit;

            match self.insert_record(plugin, origin, source_path, &handle) {
                Ok(id) => {
                    let release = pending
                        .iter()
                        .position(|(h, _)| *h == handle)
                        .map(|index| pending.remove(index).1);
                    self.contexts.retain(&handle, release);
                    self.notify_changed(&id);
                    report.accepted.push(id);
                }
                Err(rejected) => report.rejected.push(rejected),
            }
        }

        for (handle, action) in pending {
            if self.contexts.is_retained(&handle) {
                debug!(handle = %handle, "Release action dropped, context already held");
            } else {
                info!(handle = %handle, "No plugin accepted from execution context, releasing");
                ExecutionContextRegistry::release_now(&handle, action);
                report.released.push(handle.label().to_string());
            }
        }

        info!(
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            released = report.released.len(),
            "Discovery batch loaded"
        );

        report
    }

    /// Validates a unit and inserts its record. Does not retain or notify.
    ///
    /// On rejection returns the plugin id, or the handle label when the
    /// plugin could not describe itself.
    fn insert_record(
        &mut self,
        plugin: Box<dyn Plugin>,
        origin: PluginOrigin,
        source_path: Option<PathBuf>,
        handle: &ExecutionContextHandle,
    ) -> Result<PluginId, String> {
        let described = contain(|| {
            (
                plugin.describe(),
                plugin.activation_policy(),
                plugin.restart_policy(),
            )
        });
        let (metadata, activation_policy, restart_policy) = match described {
            Ok(described) => described,
            Err(panic) => {
                warn!(handle = %handle, panic = %panic, "Plugin describe panicked, rejected");
                return Err(handle.label().to_string());
            }
        };

        if metadata.id.trim().is_empty() {
            warn!(handle = %handle, name = %metadata.name, "Plugin has an empty id, rejected");
            return Err(handle.label().to_string());
        }

        if self.contains(&metadata.id) {
            warn!(
                plugin_id = %metadata.id,
                handle = %handle,
                "Plugin already loaded, rejected"
            );
            return Err(metadata.id);
        }

        let registrar = Registrar::new(
            &metadata.id,
            self.services.clone(),
            self.contributions.clone(),
            self.strings.clone(),
        );
        let mut context = PluginContext::new(&metadata.id, registrar);
        for initializer in &self.initializers {
            apply_initializer(initializer, &mut context);
        }

        info!(
            plugin_id = %metadata.id,
            version = %metadata.version,
            origin = %origin,
            handle = %handle,
            "Plugin loaded"
        );

        let id = metadata.id.clone();
        let now = Utc::now();
        self.records.push(PluginRecord {
            metadata,
            plugin,
            context,
            origin,
            source_path,
            handle: handle.clone(),
            state: PluginState::Loaded,
            last_error: None,
            activation_policy,
            restart_policy,
            loaded_at: now,
            state_changed_at: now,
            ever_started: false,
        });

        Ok(id)
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Starts a plugin. No-op if it is unknown or already started.
    ///
    /// A failed activation leaves the plugin `Failed` with the message
    /// recorded, and purges whatever it registered before failing.
    pub fn start(&mut self, id: &str) {
        let Some(record) = self.record_mut(id) else {
            debug!(plugin_id = %id, "Start ignored, plugin not loaded");
            return;
        };
        if record.state == PluginState::Started {
            return;
        }

        let failed = match record.context.activate(record.plugin.as_mut()) {
            Ok(()) => {
                record.set_state(PluginState::Started);
                record.last_error = None;
                record.ever_started = true;
                info!(plugin_id = %id, "Plugin started");
                false
            }
            Err(e) => {
                record.set_state(PluginState::Failed);
                record.last_error = Some(e.to_string());
                warn!(plugin_id = %id, error = %e, "Plugin failed to start");
                true
            }
        };

        if failed {
            self.cleanup.run(id);
        }
        self.notify_changed(id);
    }

    /// Stops a plugin.
    ///
    /// A started plugin is deactivated. Any other state (including `Failed`
    /// and `Loaded`) becomes `Stopped` directly, keeping its last error.
    /// Cleanup hooks run in every case, so calling `stop` twice is safe.
    pub fn stop(&mut self, id: &str) {
        let Some(record) = self.record_mut(id) else {
            debug!(plugin_id = %id, "Stop ignored, plugin not loaded");
            return;
        };

        if record.state == PluginState::Started {
            match record.context.deactivate(record.plugin.as_mut()) {
                Ok(()) => {
                    record.set_state(PluginState::Stopped);
                    record.last_error = None;
                    info!(plugin_id = %id, "Plugin stopped");
                }
                Err(e) => {
                    record.set_state(PluginState::Failed);
                    record.last_error = Some(e.to_string());
                    warn!(plugin_id = %id, error = %e, "Plugin failed to stop cleanly");
                }
            }
        } else {
            debug!(plugin_id = %id, state = %record.state, "Plugin not started, marking stopped");
            record.set_state(PluginState::Stopped);
        }

        self.cleanup.run(id);
        self.notify_changed(id);
    }

    /// Stops and removes a plugin, then releases its execution context.
    ///
    /// The plugin is dropped before the context's release action can run.
    pub fn unload(&mut self, id: &str) -> bool {
        if !self.contains(id) {
            debug!(plugin_id = %id, "Unload ignored, plugin not loaded");
            return false;
        }

        self.stop(id);

        let Some(index) = self.position(id) else {
            return false;
        };
        let record = self.records.remove(index);
        let handle = record.handle.clone();

        if let Err(panic) = contain(move || drop(record)) {
            warn!(plugin_id = %id, panic = %panic, "Plugin panicked while being dropped");
        }

        self.contexts.release(&handle);
        info!(plugin_id = %id, handle = %handle, "Plugin unloaded");

        self.notify_unloaded(id);
        true
    }

    /// Starts every loaded plugin.
    pub fn start_all(&mut self) {
        for id in self.ids() {
            self.start(&id);
        }
    }

    /// Stops every loaded plugin.
    pub fn stop_all(&mut self) {
        for id in self.ids() {
            self.stop(&id);
        }
    }

    /// Unloads every plugin.
    pub fn unload_all(&mut self) {
        let ids = self.ids();
        let count = ids.len();
        for id in ids {
            self.unload(&id);
        }
        info!(count, "All plugins unloaded");
    }

    /// Starts every plugin that activates on startup and is not disabled.
    ///
    /// Returns the number of plugins started by this call.
    pub fn start_auto(&mut self) -> usize {
        let candidates: Vec<PluginId> = self
            .records
            .iter()
            .filter(|r| r.activation_policy == ActivationPolicy::OnStartup)
            .filter(|r| r.state != PluginState::Started)
            .filter(|r| !self.disabled.contains(&r.metadata.id))
            .map(|r| r.metadata.id.clone())
            .collect();

        let mut started = 0;
        for id in candidates {
            self.start(&id);
            if self.record(&id).is_some_and(|r| r.state == PluginState::Started) {
                started += 1;
            }
        }
        started
    }

    /// Marks a plugin disabled and stops it.
    pub fn disable(&mut self, id: &str) -> ToggleOutcome {
        if !self.contains(id) {
            return ToggleOutcome::NotFound;
        }
        self.disabled.insert(id.to_string());
        info!(plugin_id = %id, "Plugin disabled");
        self.stop(id);
        ToggleOutcome::Applied
    }

    /// Clears a plugin's disabled mark and starts it.
    ///
    /// A plugin whose restart policy is `RequiresRestart` and that was
    /// already activated in this session is left stopped.
    pub fn enable(&mut self, id: &str) -> ToggleOutcome {
        let Some(record) = self.record(id) else {
            return ToggleOutcome::NotFound;
        };
        let needs_restart = record.restart_policy == RestartPolicy::RequiresRestart
            && record.ever_started
            && record.state != PluginState::Started;

        self.disabled.remove(id);

        if needs_restart {
            info!(plugin_id = %id, "Plugin enabled, takes effect after restart");
            return ToggleOutcome::RestartRequired;
        }

        info!(plugin_id = %id, "Plugin enabled");
        self.start(id);
        ToggleOutcome::Applied
    }

    /// Whether a plugin id is in the disabled set.
    pub fn is_disabled(&self, id: &str) -> bool {
        self.disabled.contains(id)
    }

    // ── Host hooks ───────────────────────────────────────────────

    /// Registers a context initializer.
    ///
    /// It is applied at once to every loaded plugin's context, then to
    /// every plugin loaded afterwards.
    pub fn register_context_initializer<F>(&mut self, initializer: F)
    where
        F: Fn(&mut PluginContext) + Send + 'static,
    {
        let initializer: ContextInitializer = Box::new(initializer);
        for record in &mut self.records {
            apply_initializer(&initializer, &mut record.context);
        }
        self.initializers.push(initializer);
        debug!(count = self.initializers.len(), "Context initializer registered");
    }

    /// Adds a lifecycle listener.
    pub fn add_listener(&mut self, listener: impl PluginListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Returns snapshots of every loaded plugin, in load order.
    pub fn list_plugins(&self) -> Vec<PluginSnapshot> {
        self.records.iter().map(PluginRecord::snapshot).collect()
    }

    /// Returns a snapshot of one plugin.
    pub fn get_plugin(&self, id: &str) -> Option<PluginSnapshot> {
        self.record(id).map(PluginRecord::snapshot)
    }

    /// Whether a plugin with this id is loaded.
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Number of loaded plugins.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no plugin is loaded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the service table.
    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    /// Returns the UI contribution table.
    pub fn contributions(&self) -> &Arc<ContributionRegistry> {
        &self.contributions
    }

    /// Returns the locale string overrides.
    pub fn strings(&self) -> &Arc<StringTable> {
        &self.strings
    }

    /// Returns the cleanup hook set.
    pub fn cleanup_hooks(&self) -> &CleanupHooks {
        &self.cleanup
    }

    /// Returns the execution context registry.
    pub fn execution_contexts(&self) -> &ExecutionContextRegistry {
        &self.contexts
    }

    // ── Internals ────────────────────────────────────────────────

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.metadata.id == id)
    }

    fn record(&self, id: &str) -> Option<&PluginRecord> {
        self.records.iter().find(|r| r.metadata.id == id)
    }

    fn record_mut(&mut self, id: &str) -> Option<&mut PluginRecord> {
        self.records.iter_mut().find(|r| r.metadata.id == id)
    }

    fn ids(&self) -> Vec<PluginId> {
        self.records.iter().map(|r| r.metadata.id.clone()).collect()
    }

    fn notify_changed(&self, id: &str) {
        let Some(snapshot) = self.get_plugin(id) else {
            return;
        };
        debug!(
            plugin_id = %id,
            state = %snapshot.state,
            listeners = self.listeners.len(),
            "Notifying plugin change"
        );
        for listener in &self.listeners {
            if let Err(panic) = contain(|| listener.on_changed(&snapshot)) {
                warn!(plugin_id = %id, panic = %panic, "Listener panicked in on_changed");
            }
        }
    }

    fn notify_unloaded(&self, id: &str) {
        debug!(plugin_id = %id, listeners = self.listeners.len(), "Notifying plugin unload");
        for listener in &self.listeners {
            if let Err(panic) = contain(|| listener.on_unloaded(id)) {
                warn!(plugin_id = %id, panic = %panic, "Listener panicked in on_unloaded");
            }
        }
    }
}

fn apply_initializer(initializer: &ContextInitializer, context: &mut PluginContext) {
    if let Err(panic) = contain(|| initializer(context)) {
        warn!(plugin_id = %context.plugin_id(), panic = %panic, "Context initializer panicked");
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        if !self.records.is_empty() {
            debug!(count = self.records.len(), "Plugin manager dropped with plugins loaded");
            self.unload_all();
        }
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugins", &self.ids())
            .field("cleanup", &self.cleanup)
            .field("contexts", &self.contexts)
            .field("initializers", &self.initializers.len())
            .field("listeners", &self.listeners.len())
            .field("disabled", &self.disabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::api::events::{FnListener, PluginEvent};
    use crate::traits::PluginError;

    #[derive(Default)]
    struct Calls {
        activate: AtomicUsize,
        deactivate: AtomicUsize,
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Behavior {
        Healthy,
        FailActivate,
        PanicActivate,
        FailDeactivate,
    }

    struct Probe {
        id: &'static str,
        calls: Arc<Calls>,
        behavior: Behavior,
        activation: ActivationPolicy,
        restart: RestartPolicy,
    }

    impl Probe {
        fn new(id: &'static str) -> Self {
            Self {
                id,
                calls: Arc::new(Calls::default()),
                behavior: Behavior::Healthy,
                activation: ActivationPolicy::OnStartup,
                restart: RestartPolicy::Live,
            }
        }

        fn behaving(mut self, behavior: Behavior) -> Self {
            self.behavior = behavior;
            self
        }

        fn calls(&self) -> Arc<Calls> {
            self.calls.clone()
        }
    }

    struct ProbeService(&'static str);

    impl Plugin for Probe {
        fn describe(&self) -> PluginMetadata {
            PluginMetadata::new(self.id, self.id.to_uppercase(), "1.0.0")
        }

        fn activate(&mut self, ctx: &mut PluginContext) -> Result<(), PluginError> {
            self.calls.activate.fetch_add(1, Ordering::SeqCst);
            ctx.override_string(&format!("{}.title", self.id), self.id)?;
            ctx.register_service("probe", Arc::new(ProbeService(self.id)))?;
            match self.behavior {
                Behavior::FailActivate => Err(PluginError::activation("no license")),
                Behavior::PanicActivate => panic!("activation exploded"),
                _ => Ok(()),
            }
        }

        fn deactivate(&mut self) -> Result<(), PluginError> {
            self.calls.deactivate.fetch_add(1, Ordering::SeqCst);
            if self.behavior == Behavior::FailDeactivate {
                return Err(PluginError::deactivation("still busy"));
            }
            Ok(())
        }

        fn activation_policy(&self) -> ActivationPolicy {
            self.activation
        }

        fn restart_policy(&self) -> RestartPolicy {
            self.restart
        }
    }

    #[derive(Default)]
    struct CountingHook {
        purged: Mutex<Vec<String>>,
    }

    impl CountingHook {
        fn count_for(&self, owner: &str) -> usize {
            self.purged.lock().unwrap().iter().filter(|o| *o == owner).count()
        }
    }

    impl CleanupHook for CountingHook {
        fn name(&self) -> &str {
            "counting"
        }

        fn purge_owner(&self, owner: &str) {
            self.purged.lock().unwrap().push(owner.to_string());
        }
    }

    fn unit(plugin: Probe, handle: &ExecutionContextHandle) -> DiscoveredUnit {
        DiscoveredUnit::new(Box::new(plugin), PluginOrigin::External, handle.clone())
    }

    fn counting_release(counter: &Arc<AtomicUsize>) -> ReleaseAction {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn recorded_events(manager: &mut PluginManager) -> Arc<Mutex<Vec<PluginEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        manager.add_listener(FnListener::new(move |e: &PluginEvent| {
            sink.lock().unwrap().push(e.clone())
        }));
        events
    }

    #[test]
    fn test_duplicate_load_changes_nothing() {
        let mut manager = PluginManager::new();
        let handle = ExecutionContextHandle::new("libspell.so");
        let released = Arc::new(AtomicUsize::new(0));

        assert!(manager.load(unit(Probe::new("spell"), &handle)));
        let events = recorded_events(&mut manager);

        let duplicate =
            unit(Probe::new("spell"), &handle).with_release(counting_release(&released));
        assert!(!manager.load(duplicate));

        assert_eq!(manager.len(), 1);
        assert_eq!(manager.execution_contexts().ref_count(&handle), 1);
        assert_eq!(released.load(Ordering::SeqCst), 0);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_load_all_releases_fully_rejected_handle_once() {
        let mut manager = PluginManager::new();
        let builtin = ExecutionContextHandle::new("builtin");
        manager.load(unit(Probe::new("a"), &builtin));
        manager.load(unit(Probe::new("b"), &builtin));

        let archive = ExecutionContextHandle::new("archive.so");
        let released = Arc::new(AtomicUsize::new(0));
        let mut batch = DiscoveryResult::new();
        batch.push(unit(Probe::new("a"), &archive).with_release(counting_release(&released)));
        batch.push(unit(Probe::new("b"), &archive).with_release(counting_release(&released)));

        let report = manager.load_all(batch);

        assert!(report.accepted.is_empty());
        assert_eq!(report.rejected, vec!["a", "b"]);
        assert_eq!(report.released, vec!["archive.so"]);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(manager.execution_contexts().ref_count(&archive), 0);
        assert!(!manager.execution_contexts().is_retained(&archive));
    }

    #[test]
    fn test_load_all_hands_release_to_first_accepted_unit() {
        let mut manager = PluginManager::new();
        let builtin = ExecutionContextHandle::new("builtin");
        manager.load(unit(Probe::new("a"), &builtin));

        let archive = ExecutionContextHandle::new("archive.so");
        let released = Arc::new(AtomicUsize::new(0));
        let mut batch = DiscoveryResult::new();
        batch.push(unit(Probe::new("a"), &archive).with_release(counting_release(&released)));
        batch.push(unit(Probe::new("c"), &archive));

        let report = manager.load_all(batch);
        assert_eq!(report.accepted, vec!["c"]);
        assert!(report.released.is_empty());
        assert_eq!(released.load(Ordering::SeqCst), 0);
        assert_eq!(manager.execution_contexts().ref_count(&archive), 1);

        manager.unload("c");
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_activation_is_contained_and_cleaned_up() {
        let hook = Arc::new(CountingHook::default());
        let mut manager = PluginManager::builder().cleanup_hook(hook.clone()).build();
        let handle = ExecutionContextHandle::new("builtin");
        manager.load(unit(Probe::new("ok"), &handle));
        manager.load(unit(Probe::new("bad").behaving(Behavior::FailActivate), &handle));

        manager.start_all();

        let bad = manager.get_plugin("bad").unwrap();
        assert_eq!(bad.state, PluginState::Failed);
        assert!(bad.last_error.as_deref().unwrap().contains("no license"));
        assert_eq!(hook.count_for("bad"), 1);
        assert_eq!(hook.count_for("ok"), 0);

        // Registrations made before the failure are gone, the healthy plugin's remain.
        assert_eq!(manager.strings().get("bad.title"), None);
        assert_eq!(manager.strings().get("ok.title").as_deref(), Some("ok"));
        assert_eq!(manager.services().count_for_owner("bad"), 0);
        assert_eq!(manager.services().count_for_owner("ok"), 1);
    }

    #[test]
    fn test_panicking_activation_marks_failed() {
        let mut manager = PluginManager::new();
        let handle = ExecutionContextHandle::new("builtin");
        manager.load(unit(Probe::new("boom").behaving(Behavior::PanicActivate), &handle));

        manager.start("boom");

        let snapshot = manager.get_plugin("boom").unwrap();
        assert_eq!(snapshot.state, PluginState::Failed);
        assert!(snapshot.last_error.unwrap().contains("activation exploded"));
        assert_eq!(manager.strings().get("boom.title"), None);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut manager = PluginManager::new();
        let handle = ExecutionContextHandle::new("builtin");
        let probe = Probe::new("spell");
        let calls = probe.calls();
        manager.load(unit(probe, &handle));
        manager.start("spell");

        manager.stop("spell");
        manager.stop("spell");

        assert_eq!(manager.get_plugin("spell").unwrap().state, PluginState::Stopped);
        assert_eq!(calls.deactivate.load(Ordering::SeqCst), 1);
        assert!(manager.strings().get("spell.title").is_none());
    }

    #[test]
    fn test_start_twice_activates_once() {
        let mut manager = PluginManager::new();
        let handle = ExecutionContextHandle::new("builtin");
        let probe = Probe::new("spell");
        let calls = probe.calls();
        manager.load(unit(probe, &handle));

        manager.start("spell");
        manager.start("spell");

        assert_eq!(calls.activate.load(Ordering::SeqCst), 1);
        assert!(manager.get_plugin("spell").unwrap().is_active());
    }

    #[test]
    fn test_stop_forces_failed_and_loaded_to_stopped() {
        let mut manager = PluginManager::new();
        let handle = ExecutionContextHandle::new("builtin");
        manager.load(unit(Probe::new("fresh"), &handle));
        manager.load(unit(Probe::new("bad").behaving(Behavior::FailActivate), &handle));
        manager.start("bad");

        manager.stop("fresh");
        manager.stop("bad");

        assert_eq!(manager.get_plugin("fresh").unwrap().state, PluginState::Stopped);
        let bad = manager.get_plugin("bad").unwrap();
        assert_eq!(bad.state, PluginState::Stopped);
        assert!(bad.last_error.is_some());
    }

    #[test]
    fn test_failing_deactivate_marks_failed_but_cleans_up() {
        let hook = Arc::new(CountingHook::default());
        let mut manager = PluginManager::builder().cleanup_hook(hook.clone()).build();
        let handle = ExecutionContextHandle::new("builtin");
        manager.load(unit(Probe::new("sticky").behaving(Behavior::FailDeactivate), &handle));
        manager.start("sticky");

        manager.stop("sticky");

        let snapshot = manager.get_plugin("sticky").unwrap();
        assert_eq!(snapshot.state, PluginState::Failed);
        assert!(snapshot.last_error.unwrap().contains("still busy"));
        assert_eq!(hook.count_for("sticky"), 1);
        assert_eq!(manager.services().count_for_owner("sticky"), 0);
    }

    #[test]
    fn test_shared_handle_released_by_last_unload() {
        let mut manager = PluginManager::new();
        let handle = ExecutionContextHandle::new("bundle.so");
        let released = Arc::new(AtomicUsize::new(0));
        manager.load(unit(Probe::new("a"), &handle).with_release(counting_release(&released)));
        manager.load(unit(Probe::new("b"), &handle));

        assert!(manager.unload("a"));
        assert_eq!(released.load(Ordering::SeqCst), 0);
        assert_eq!(manager.execution_contexts().ref_count(&handle), 1);

        assert!(manager.unload("b"));
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(!manager.unload("b"));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_initializer_applies_to_existing_and_future_contexts() {
        struct EditorName(&'static str);

        let mut manager = PluginManager::new();
        let handle = ExecutionContextHandle::new("builtin");
        manager.load(unit(Probe::new("a"), &handle));
        manager.load(unit(Probe::new("b"), &handle));

        let applied = Arc::new(AtomicUsize::new(0));
        let counter = applied.clone();
        manager.register_context_initializer(move |ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            ctx.insert_extension(EditorName("quill"));
        });
        assert_eq!(applied.load(Ordering::SeqCst), 2);

        manager.load(unit(Probe::new("c"), &handle));
        assert_eq!(applied.load(Ordering::SeqCst), 3);

        for record in &manager.records {
            assert_eq!(record.context.extension::<EditorName>().unwrap().0, "quill");
        }
    }

    #[test]
    fn test_initializers_run_in_registration_order() {
        struct Theme(&'static str);

        let mut manager = PluginManager::new();
        let handle = ExecutionContextHandle::new("builtin");
        manager.load(unit(Probe::new("a"), &handle));

        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second"] {
            let sink = log.clone();
            manager.register_context_initializer(move |ctx| {
                sink.lock().unwrap().push(format!("{}:{}", name, ctx.plugin_id()));
                ctx.insert_extension(Theme(name));
            });
        }
        manager.load(unit(Probe::new("b"), &handle));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:a", "second:a", "first:b", "second:b"]
        );
        for record in &manager.records {
            assert_eq!(record.context.extension::<Theme>().unwrap().0, "second");
        }
    }

    #[test]
    fn test_panicking_initializer_does_not_block_load() {
        let mut manager = PluginManager::new();
        manager.register_context_initializer(|_| panic!("initializer broke"));

        let handle = ExecutionContextHandle::new("builtin");
        assert!(manager.load(unit(Probe::new("a"), &handle)));
        manager.start("a");
        assert!(manager.get_plugin("a").unwrap().is_active());
    }

    #[test]
    fn test_listeners_see_every_transition_in_order() {
        let mut manager = PluginManager::new();
        let events = recorded_events(&mut manager);
        let second = Arc::new(Mutex::new(Vec::new()));
        let sink = second.clone();
        manager.add_listener(FnListener::new(move |e: &PluginEvent| {
            sink.lock().unwrap().push(e.clone())
        }));

        let handle = ExecutionContextHandle::new("builtin");
        manager.load(unit(Probe::new("a"), &handle));
        manager.start("a");
        manager.unload("a");

        let seen = |events: &Arc<Mutex<Vec<PluginEvent>>>| -> Vec<(String, Option<PluginState>)> {
            events
                .lock()
                .unwrap()
                .iter()
                .map(|e| (e.plugin_id().to_string(), e.state()))
                .collect()
        };
        let expected = vec![
            ("a".to_string(), Some(PluginState::Loaded)),
            ("a".to_string(), Some(PluginState::Started)),
            ("a".to_string(), Some(PluginState::Stopped)),
            ("a".to_string(), None),
        ];
        assert_eq!(seen(&events), expected);
        assert_eq!(seen(&second), expected);
    }

    #[test]
    fn test_change_events_carry_snapshot_of_transition() {
        let mut manager = PluginManager::new();
        let events = recorded_events(&mut manager);

        let handle = ExecutionContextHandle::new("libspell.so");
        manager.load(unit(Probe::new("spell").behaving(Behavior::FailActivate), &handle));
        manager.start("spell");

        let snapshot = match events.lock().unwrap().last().cloned() {
            Some(PluginEvent::Changed(snapshot)) => snapshot,
            other => panic!("expected a change event, got {other:?}"),
        };
        assert_eq!(snapshot.id, "spell");
        assert_eq!(snapshot.state, PluginState::Failed);
        assert!(snapshot.last_error.as_deref().unwrap().contains("no license"));
    }

    #[test]
    fn test_start_auto_skips_manual_and_disabled() {
        let mut manager = PluginManager::builder().disabled(["off"]).build();
        let handle = ExecutionContextHandle::new("builtin");
        let mut manual = Probe::new("manual");
        manual.activation = ActivationPolicy::Manual;
        manager.load(unit(Probe::new("auto"), &handle));
        manager.load(unit(manual, &handle));
        manager.load(unit(Probe::new("off"), &handle));

        assert_eq!(manager.start_auto(), 1);
        assert!(manager.get_plugin("auto").unwrap().is_active());
        assert_eq!(manager.get_plugin("manual").unwrap().state, PluginState::Loaded);
        assert_eq!(manager.get_plugin("off").unwrap().state, PluginState::Loaded);
        assert!(manager.is_disabled("off"));
    }

    #[test]
    fn test_disable_and_enable_live_plugin() {
        let mut manager = PluginManager::new();
        let handle = ExecutionContextHandle::new("builtin");
        manager.load(unit(Probe::new("spell"), &handle));
        manager.start("spell");

        assert_eq!(manager.disable("spell"), ToggleOutcome::Applied);
        assert!(manager.is_disabled("spell"));
        assert_eq!(manager.get_plugin("spell").unwrap().state, PluginState::Stopped);

        assert_eq!(manager.enable("spell"), ToggleOutcome::Applied);
        assert!(!manager.is_disabled("spell"));
        assert!(manager.get_plugin("spell").unwrap().is_active());

        assert_eq!(manager.disable("ghost"), ToggleOutcome::NotFound);
        assert_eq!(manager.enable("ghost"), ToggleOutcome::NotFound);
    }

    #[test]
    fn test_enable_requires_restart_after_activation() {
        let mut manager = PluginManager::new();
        let handle = ExecutionContextHandle::new("builtin");
        let mut probe = Probe::new("vcs");
        probe.restart = RestartPolicy::RequiresRestart;
        let calls = probe.calls();
        manager.load(unit(probe, &handle));
        manager.start("vcs");
        manager.disable("vcs");

        assert_eq!(manager.enable("vcs"), ToggleOutcome::RestartRequired);
        assert!(!manager.is_disabled("vcs"));
        assert_eq!(manager.get_plugin("vcs").unwrap().state, PluginState::Stopped);
        assert_eq!(calls.activate.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_unloads_and_releases() {
        let released = Arc::new(AtomicUsize::new(0));
        {
            let mut manager = PluginManager::new();
            let handle = ExecutionContextHandle::new("bundle.so");
            manager.load(unit(Probe::new("a"), &handle).with_release(counting_release(&released)));
            manager.start("a");
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let mut manager = PluginManager::new();
        let events = recorded_events(&mut manager);

        manager.start("ghost");
        manager.stop("ghost");
        assert!(!manager.unload("ghost"));

        assert!(manager.get_plugin("ghost").is_none());
        assert!(events.lock().unwrap().is_empty());
    }
}
