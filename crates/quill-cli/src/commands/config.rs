//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use quill_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Validate the configuration
    Validate,
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let config = super::load_config(config_path)?;
            output::print_item(&config, format);
        }
        ConfigCommand::Validate => match super::load_config(config_path) {
            Ok(config) => {
                output::print_success(&format!(
                    "Configuration '{}' is valid",
                    config_path.unwrap_or("config/default")
                ));
                output::print_kv("Plugin directory", &config.plugins.directory);
                output::print_kv("Auto load", &config.plugins.auto_load.to_string());
                output::print_kv("Auto start", &config.plugins.auto_start.to_string());
                output::print_kv("Disabled", &config.plugins.disabled.join(", "));
                output::print_kv("Log level", &config.logging.level);
                output::print_kv("Log format", &config.logging.format);
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {}", e));
                return Err(e);
            }
        },
    }

    Ok(())
}
