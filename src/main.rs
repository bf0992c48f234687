//! Quill plugin host.
//!
//! Loads the configured plugins, starts the ones that activate on startup
//! and keeps them running until the process is asked to stop.

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{EnvFilter, fmt};

use plugin_markdown::MarkdownPlugin;
use quill_core::config::AppConfig;
use quill_core::error::AppError;
use quill_plugin::{
    BuiltinDiscovery, ChannelListener, Discovery, DiscoveryChain, EditorInfo, LibraryDiscovery,
    LoadReport, PluginEvent, PluginHostService, PluginManager,
};

/// Capacity of the lifecycle event channel.
const EVENT_CAPACITY: usize = 256;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Host error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from an explicit file or the layered defaults
fn load_configuration() -> Result<AppConfig, AppError> {
    if let Ok(path) = std::env::var("QUILL_CONFIG") {
        return AppConfig::load_from(&path)
            .map_err(|e| AppError::internal(format!("Config load error: {}", e)));
    }

    let env = std::env::var("QUILL_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env).map_err(|e| AppError::internal(format!("Config load error: {}", e)))
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.is_json() {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .pretty()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Main host run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Quill plugin host v{}", env!("CARGO_PKG_VERSION"));

    let (listener, mut events) = ChannelListener::new(EVENT_CAPACITY);
    let mut manager = PluginManager::builder()
        .disabled(config.plugins.disabled.iter().cloned())
        .listener(listener)
        .build();

    let editor = EditorInfo::new("Quill", env!("CARGO_PKG_VERSION"));
    manager.register_context_initializer(move |ctx| ctx.insert_extension(editor.clone()));

    let event_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(PluginEvent::Changed(snapshot)) => tracing::debug!(
                    plugin_id = %snapshot.id,
                    state = %snapshot.state,
                    "Plugin changed"
                ),
                Ok(PluginEvent::Unloaded(id)) => {
                    tracing::debug!(plugin_id = %id, "Plugin unloaded")
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Plugin event log lagged")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    if config.plugins.auto_load {
        load_plugins(&mut manager, &config.plugins.directory)?;
    } else {
        tracing::info!("Plugin auto-load disabled");
    }

    if config.plugins.auto_start {
        let started = manager.start_auto();
        tracing::info!(started, "Startup plugins activated");
    }

    let host = PluginHostService::spawn(manager)?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, unloading plugins...");

    host.shutdown().await?;
    drop(host);

    // The manager, and with it the only event sender, is gone now
    if event_log.await.is_err() {
        tracing::warn!("Plugin event log task failed");
    }

    tracing::info!("Quill plugin host shut down gracefully");
    Ok(())
}

/// Discover built-in and library plugins and load them
fn load_plugins(manager: &mut PluginManager, directory: &str) -> Result<LoadReport, AppError> {
    // SAFETY: the plugin directory is chosen by the operator and trusted.
    let libraries = unsafe { LibraryDiscovery::new(directory) };
    let mut discovery = DiscoveryChain::new()
        .with(BuiltinDiscovery::new().with(|| Box::new(MarkdownPlugin::new())))
        .with(libraries);

    let report = manager.load_all(discovery.discover()?);
    tracing::info!(
        accepted = report.accepted.len(),
        rejected = report.rejected.len(),
        released = ?report.released,
        "Plugins loaded"
    );
    Ok(report)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
