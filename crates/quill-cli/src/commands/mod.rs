//! CLI command definitions and dispatch.

pub mod check;
pub mod config;
pub mod list;

use clap::{Parser, Subcommand};

use plugin_markdown::MarkdownPlugin;
use quill_core::config::{AppConfig, PluginConfig};
use quill_core::error::AppError;
use quill_plugin::{BuiltinDiscovery, DiscoveryChain, LibraryDiscovery, PluginManager};

use crate::output::OutputFormat;

/// Quill plugin host administration
#[derive(Debug, Parser)]
#[command(name = "quill-cli", version, about, long_about = None)]
pub struct Cli {
    /// Path to a configuration file (default: config/default + config/$QUILL_ENV)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List discovered plugins without starting them
    List(list::ListArgs),
    /// Run every plugin through start, stop and unload
    Check(check::CheckArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config_path = self.config.as_deref();
        match &self.command {
            Commands::List(args) => list::execute(args, config_path, self.format).await,
            Commands::Check(args) => check::execute(args, config_path, self.format).await,
            Commands::Config(args) => config::execute(args, config_path, self.format).await,
        }
    }
}

/// Helper: load configuration from an explicit file or the layered defaults
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, AppError> {
    match config_path {
        Some(path) => AppConfig::load_from(path),
        None => {
            let env = std::env::var("QUILL_ENV").unwrap_or_else(|_| "development".to_string());
            AppConfig::load(&env)
        }
    }
}

/// Helper: built-in plugins followed by the libraries in the plugin directory
pub fn discovery(config: &PluginConfig, directory: Option<&str>) -> DiscoveryChain {
    let directory = directory.unwrap_or(&config.directory);
    // SAFETY: the plugin directory is chosen by the operator and trusted.
    let libraries = unsafe { LibraryDiscovery::new(directory) };

    DiscoveryChain::new()
        .with(BuiltinDiscovery::new().with(|| Box::new(MarkdownPlugin::new())))
        .with(libraries)
}

/// Helper: a manager honoring the configured disabled list
pub fn manager(config: &PluginConfig) -> PluginManager {
    PluginManager::builder()
        .disabled(config.disabled.iter().cloned())
        .build()
}
