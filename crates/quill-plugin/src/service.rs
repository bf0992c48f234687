//! Plugin host service: runs a [`PluginManager`] on its own thread and
//! marshals calls from async code onto it.
//!
//! The manager is single-coordinator. Rather than lock it, the
//! service owns it on a dedicated thread and processes commands one at a
//! time, in arrival order.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use quill_core::error::AppError;
use quill_core::result::AppResult;

use crate::discovery::DiscoveryResult;
use crate::manager::{LoadReport, PluginManager, ToggleOutcome};
use crate::types::{PluginId, PluginSnapshot};

/// Depth of the command queue.
const COMMAND_BUFFER: usize = 64;

/// A request for the host thread.
enum HostCommand {
    LoadAll {
        result: DiscoveryResult,
        reply: oneshot::Sender<LoadReport>,
    },
    Start {
        id: PluginId,
        reply: oneshot::Sender<Option<PluginSnapshot>>,
    },
    Stop {
        id: PluginId,
        reply: oneshot::Sender<Option<PluginSnapshot>>,
    },
    Unload {
        id: PluginId,
        reply: oneshot::Sender<bool>,
    },
    StartAll {
        reply: oneshot::Sender<()>,
    },
    StartAuto {
        reply: oneshot::Sender<usize>,
    },
    StopAll {
        reply: oneshot::Sender<()>,
    },
    Enable {
        id: PluginId,
        reply: oneshot::Sender<ToggleOutcome>,
    },
    Disable {
        id: PluginId,
        reply: oneshot::Sender<ToggleOutcome>,
    },
    List {
        reply: oneshot::Sender<Vec<PluginSnapshot>>,
    },
    Get {
        id: PluginId,
        reply: oneshot::Sender<Option<PluginSnapshot>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Spawns the host thread.
#[derive(Debug)]
pub struct PluginHostService;

impl PluginHostService {
    /// Moves `manager` onto a dedicated thread and returns a handle to it.
    pub fn spawn(manager: PluginManager) -> AppResult<PluginHostHandle> {
        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);

        let thread = std::thread::Builder::new()
            .name("quill-plugin-host".to_string())
            .spawn(move || run(manager, receiver))?;

        info!("Plugin host thread started");

        Ok(PluginHostHandle {
            sender,
            thread: Arc::new(Mutex::new(Some(thread))),
        })
    }
}

/// The host thread's command loop.
fn run(mut manager: PluginManager, mut receiver: mpsc::Receiver<HostCommand>) {
    while let Some(command) = receiver.blocking_recv() {
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            HostCommand::LoadAll { result, reply } => {
                let _ = reply.send(manager.load_all(result));
            }
            HostCommand::Start { id, reply } => {
                manager.start(&id);
                let _ = reply.send(manager.get_plugin(&id));
            }
            HostCommand::Stop { id, reply } => {
                manager.stop(&id);
                let _ = reply.send(manager.get_plugin(&id));
            }
            HostCommand::Unload { id, reply } => {
                let _ = reply.send(manager.unload(&id));
            }
            HostCommand::StartAll { reply } => {
                manager.start_all();
                let _ = reply.send(());
            }
            HostCommand::StartAuto { reply } => {
                let _ = reply.send(manager.start_auto());
            }
            HostCommand::StopAll { reply } => {
                manager.stop_all();
                let _ = reply.send(());
            }
            HostCommand::Enable { id, reply } => {
                let _ = reply.send(manager.enable(&id));
            }
            HostCommand::Disable { id, reply } => {
                let _ = reply.send(manager.disable(&id));
            }
            HostCommand::List { reply } => {
                let _ = reply.send(manager.list_plugins());
            }
            HostCommand::Get { id, reply } => {
                let _ = reply.send(manager.get_plugin(&id));
            }
            HostCommand::Shutdown { reply } => {
                manager.unload_all();
                let _ = reply.send(());
                break;
            }
        }
    }

    debug!("Plugin host thread exiting");
}

/// Cloneable async handle onto the host thread.
#[derive(Debug, Clone)]
pub struct PluginHostHandle {
    sender: mpsc::Sender<HostCommand>,
    thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PluginHostHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> HostCommand,
    ) -> AppResult<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(reply))
            .await
            .map_err(|_| AppError::service_unavailable("Plugin host has shut down"))?;
        response
            .await
            .map_err(|_| AppError::service_unavailable("Plugin host dropped the request"))
    }

    /// Loads a discovery batch.
    pub async fn load_all(&self, result: DiscoveryResult) -> AppResult<LoadReport> {
        self.request(|reply| HostCommand::LoadAll { result, reply }).await
    }

    /// Starts a plugin and returns its snapshot afterwards.
    pub async fn start(&self, id: &str) -> AppResult<Option<PluginSnapshot>> {
        let id = id.to_string();
        self.request(|reply| HostCommand::Start { id, reply }).await
    }

    /// Stops a plugin and returns its snapshot afterwards.
    pub async fn stop(&self, id: &str) -> AppResult<Option<PluginSnapshot>> {
        let id = id.to_string();
        self.request(|reply| HostCommand::Stop { id, reply }).await
    }

    /// Unloads a plugin.
    pub async fn unload(&self, id: &str) -> AppResult<bool> {
        let id = id.to_string();
        self.request(|reply| HostCommand::Unload { id, reply }).await
    }

    /// Starts every loaded plugin.
    pub async fn start_all(&self) -> AppResult<()> {
        self.request(|reply| HostCommand::StartAll { reply }).await
    }

    /// Starts every plugin that activates on startup and is not disabled.
    pub async fn start_auto(&self) -> AppResult<usize> {
        self.request(|reply| HostCommand::StartAuto { reply }).await
    }

    /// Stops every loaded plugin.
    pub async fn stop_all(&self) -> AppResult<()> {
        self.request(|reply| HostCommand::StopAll { reply }).await
    }

    /// Enables a plugin.
    pub async fn enable(&self, id: &str) -> AppResult<ToggleOutcome> {
        let id = id.to_string();
        self.request(|reply| HostCommand::Enable { id, reply }).await
    }

    /// Disables a plugin.
    pub async fn disable(&self, id: &str) -> AppResult<ToggleOutcome> {
        let id = id.to_string();
        self.request(|reply| HostCommand::Disable { id, reply }).await
    }

    /// Lists all loaded plugins.
    pub async fn list_plugins(&self) -> AppResult<Vec<PluginSnapshot>> {
        self.request(|reply| HostCommand::List { reply }).await
    }

    /// Returns one plugin's snapshot.
    pub async fn get_plugin(&self, id: &str) -> AppResult<Option<PluginSnapshot>> {
        let id = id.to_string();
        self.request(|reply| HostCommand::Get { id, reply }).await
    }

    /// Unloads every plugin and joins the host thread.
    ///
    /// Later calls on any clone of this handle fail with
    /// `SERVICE_UNAVAILABLE`.
    pub async fn shutdown(&self) -> AppResult<()> {
        self.request(|reply| HostCommand::Shutdown { reply }).await?;

        let thread = self
            .thread
            .lock()
            .map_err(|_| AppError::internal("Plugin host thread handle poisoned"))?
            .take();

        if let Some(thread) = thread {
            let joined = tokio::task::spawn_blocking(move || thread.join())
                .await
                .map_err(|e| AppError::internal(format!("Join task failed: {e}")))?;
            if joined.is_err() {
                error!("Plugin host thread panicked");
                return Err(AppError::internal("Plugin host thread panicked"));
            }
        }

        info!("Plugin host stopped");
        Ok(())
    }
}
