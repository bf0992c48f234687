//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use quill_plugin::prelude::*;
use quill_plugin::{
    CleanupHook, DiscoveredUnit, ExecutionContextHandle, PluginOrigin, ReleaseAction,
};

/// Activation and deactivation counters shared with the test.
#[derive(Debug, Default)]
pub struct Calls {
    pub activate: AtomicUsize,
    pub deactivate: AtomicUsize,
}

impl Calls {
    pub fn activations(&self) -> usize {
        self.activate.load(Ordering::SeqCst)
    }

    pub fn deactivations(&self) -> usize {
        self.deactivate.load(Ordering::SeqCst)
    }
}

/// A plugin registering one service, one toolbar item and one string.
pub struct TestPlugin {
    pub id: &'static str,
    pub calls: Arc<Calls>,
}

impl TestPlugin {
    pub fn new(id: &'static str) -> (Self, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        (
            Self {
                id,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

/// Service type registered by [`TestPlugin`].
pub struct Greeter(pub &'static str);

impl Plugin for TestPlugin {
    fn describe(&self) -> PluginMetadata {
        plugin_metadata!(id: self.id, name: self.id, version: "1.0.0")
    }

    fn activate(&mut self, ctx: &mut PluginContext) -> Result<(), PluginError> {
        self.calls.activate.fetch_add(1, Ordering::SeqCst);
        ctx.register_service("greeter", Arc::new(Greeter(self.id)))?;
        ctx.contribute(Contribution::ToolbarItem {
            id: format!("{}.run", self.id),
            label: self.id.to_uppercase(),
            command: format!("{}.run", self.id),
        })?;
        ctx.override_string(&format!("{}.title", self.id), self.id)
    }

    fn deactivate(&mut self) -> Result<(), PluginError> {
        self.calls.deactivate.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Cleanup hook recording every owner it was asked to purge.
#[derive(Debug, Default)]
pub struct RecordingHook {
    purged: Mutex<Vec<String>>,
}

impl RecordingHook {
    pub fn purged(&self) -> Vec<String> {
        self.purged.lock().unwrap().clone()
    }
}

impl CleanupHook for RecordingHook {
    fn name(&self) -> &str {
        "recording"
    }

    fn purge_owner(&self, owner: &str) {
        self.purged.lock().unwrap().push(owner.to_string());
    }
}

/// Wraps a plugin into an external unit from `handle`.
pub fn unit(plugin: impl Plugin + 'static, handle: &ExecutionContextHandle) -> DiscoveredUnit {
    DiscoveredUnit::new(Box::new(plugin), PluginOrigin::External, handle.clone())
}

/// A release action counting its invocations.
pub fn counting_release(counter: &Arc<AtomicUsize>) -> ReleaseAction {
    let counter = counter.clone();
    Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

/// A plugin that hands its registrar out for background work.
pub struct BackgroundPlugin {
    pub id: &'static str,
    pub registrar: Arc<Mutex<Option<Registrar>>>,
}

impl BackgroundPlugin {
    pub fn new(id: &'static str) -> (Self, Arc<Mutex<Option<Registrar>>>) {
        let registrar = Arc::new(Mutex::new(None));
        (
            Self {
                id,
                registrar: registrar.clone(),
            },
            registrar,
        )
    }
}

impl Plugin for BackgroundPlugin {
    fn describe(&self) -> PluginMetadata {
        plugin_metadata!(id: self.id, name: self.id, version: "1.0.0")
    }

    fn activate(&mut self, ctx: &mut PluginContext) -> Result<(), PluginError> {
        *self.registrar.lock().unwrap() = Some(ctx.registrar());
        Ok(())
    }
}
