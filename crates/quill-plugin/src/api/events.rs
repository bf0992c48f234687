//! Lifecycle notifications for host code that tracks plugin state.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::types::{PluginSnapshot, PluginState};

/// A lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum PluginEvent {
    /// The plugin was loaded or changed state; carries its state afterwards.
    Changed(Box<PluginSnapshot>),
    /// The plugin was removed from the host.
    Unloaded(String),
}

impl PluginEvent {
    /// Returns the plugin id the event refers to.
    pub fn plugin_id(&self) -> &str {
        match self {
            Self::Changed(snapshot) => &snapshot.id,
            Self::Unloaded(id) => id,
        }
    }

    /// Returns the state a change moved the plugin to.
    pub fn state(&self) -> Option<PluginState> {
        match self {
            Self::Changed(snapshot) => Some(snapshot.state),
            Self::Unloaded(_) => None,
        }
    }
}

/// Receives lifecycle notifications from the manager.
///
/// Called synchronously on the host thread, in registration order, before
/// the manager operation that caused them returns. Listeners cannot call
/// back into the manager, so each change carries the plugin's snapshot as
/// of that transition; to react further, queue work elsewhere.
pub trait PluginListener: Send {
    /// Fired after every load, start, stop, or failure transition.
    fn on_changed(&self, snapshot: &PluginSnapshot);

    /// Fired once, after the plugin has been removed from the table.
    fn on_unloaded(&self, _plugin_id: &str) {}
}

/// A closure-based listener receiving every [`PluginEvent`].
pub struct FnListener<F>
where
    F: Fn(&PluginEvent) + Send,
{
    handler: F,
}

impl<F> FnListener<F>
where
    F: Fn(&PluginEvent) + Send,
{
    /// Wraps a closure.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> PluginListener for FnListener<F>
where
    F: Fn(&PluginEvent) + Send,
{
    fn on_changed(&self, snapshot: &PluginSnapshot) {
        (self.handler)(&PluginEvent::Changed(Box::new(snapshot.clone())));
    }

    fn on_unloaded(&self, plugin_id: &str) {
        (self.handler)(&PluginEvent::Unloaded(plugin_id.to_string()));
    }
}

impl<F> std::fmt::Debug for FnListener<F>
where
    F: Fn(&PluginEvent) + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnListener")
            .field("handler", &"<closure>")
            .finish()
    }
}

/// Forwards notifications into a broadcast channel for async consumers
/// such as the UI shell.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: broadcast::Sender<PluginEvent>,
}

impl ChannelListener {
    /// Creates a listener with the given channel capacity and returns it
    /// together with a first receiver.
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<PluginEvent>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Creates an additional receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.sender.subscribe()
    }

    fn send(&self, event: PluginEvent) {
        // No subscribers is not an error for a notification fan-out
        if self.sender.send(event).is_err() {
            trace!("Plugin event dropped, no subscribers");
        }
    }
}

impl PluginListener for ChannelListener {
    fn on_changed(&self, snapshot: &PluginSnapshot) {
        self.send(PluginEvent::Changed(Box::new(snapshot.clone())));
    }

    fn on_unloaded(&self, plugin_id: &str) {
        self.send(PluginEvent::Unloaded(plugin_id.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Utc;

    use super::*;
    use crate::types::{ActivationPolicy, PluginOrigin, RestartPolicy};

    fn snapshot(id: &str, state: PluginState) -> PluginSnapshot {
        let now = Utc::now();
        PluginSnapshot {
            id: id.into(),
            name: id.into(),
            version: "1.0.0".into(),
            description: String::new(),
            origin: PluginOrigin::Builtin,
            state,
            source_path: None,
            last_error: None,
            activation_policy: ActivationPolicy::OnStartup,
            restart_policy: RestartPolicy::Live,
            loaded_at: now,
            state_changed_at: now,
        }
    }

    #[test]
    fn test_fn_listener_maps_callbacks_to_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener = FnListener::new(move |e: &PluginEvent| sink.lock().unwrap().push(e.clone()));

        listener.on_changed(&snapshot("markdown", PluginState::Started));
        listener.on_unloaded("markdown");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].plugin_id(), "markdown");
        assert_eq!(seen[0].state(), Some(PluginState::Started));
        assert_eq!(seen[1], PluginEvent::Unloaded("markdown".into()));
    }

    #[test]
    fn test_channel_listener_broadcasts() {
        let (listener, mut rx) = ChannelListener::new(8);
        let loaded = snapshot("markdown", PluginState::Loaded);
        listener.on_changed(&loaded);
        listener.on_unloaded("markdown");

        assert_eq!(rx.try_recv().unwrap(), PluginEvent::Changed(Box::new(loaded)));
        assert_eq!(rx.try_recv().unwrap().plugin_id(), "markdown");
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(PluginEvent::Unloaded("spell".into())).unwrap();
        assert_eq!(json, serde_json::json!({"event": "unloaded", "data": "spell"}));

        let json =
            serde_json::to_value(PluginEvent::Changed(Box::new(snapshot("spell", PluginState::Failed))))
                .unwrap();
        assert_eq!(json["event"], "changed");
        assert_eq!(json["data"]["id"], "spell");
        assert_eq!(json["data"]["state"], "failed");
    }
}
