//! Plugin listing command.

use clap::Args;

use quill_core::error::AppError;
use quill_plugin::Discovery;

use crate::output::{self, OutputFormat, PluginRow};

/// Arguments for the list command
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Plugin library directory (overrides the configuration)
    #[arg(short, long)]
    pub dir: Option<String>,
}

/// Discover and load plugins, then print their snapshots
pub async fn execute(
    args: &ListArgs,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let mut discovery = super::discovery(&config.plugins, args.dir.as_deref());
    let mut manager = super::manager(&config.plugins);

    let report = manager.load_all(discovery.discover()?);

    let rows: Vec<PluginRow> = manager.list_plugins().iter().map(PluginRow::from).collect();
    output::print_list(&rows, format);

    if format == OutputFormat::Table {
        for id in &report.rejected {
            output::print_warning(&format!("Rejected duplicate or invalid plugin '{}'", id));
        }
    }

    manager.unload_all();
    Ok(())
}
