//! Plugin lifecycle check command.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use quill_core::error::AppError;
use quill_plugin::{Discovery, PluginHostService, PluginState};

use crate::output::{self, OutputFormat};

/// Arguments for the check command
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Plugin library directory (overrides the configuration)
    #[arg(short, long)]
    pub dir: Option<String>,

    /// Check only this plugin
    #[arg(long)]
    pub id: Option<String>,
}

/// Outcome of checking one plugin
#[derive(Debug, Serialize, Tabled)]
pub struct CheckRow {
    /// Plugin id
    #[tabled(rename = "ID")]
    pub id: String,
    /// State after start
    #[tabled(rename = "Start")]
    pub start: String,
    /// State after stop
    #[tabled(rename = "Stop")]
    pub stop: String,
    /// Unloaded cleanly
    #[tabled(rename = "Unload")]
    pub unloaded: bool,
    /// First recorded error
    #[tabled(rename = "Error")]
    pub error: String,
}

impl CheckRow {
    fn passed(&self) -> bool {
        self.start == PluginState::Started.as_str()
            && self.stop == PluginState::Stopped.as_str()
            && self.unloaded
    }
}

/// Start, stop and unload every plugin on the host thread
pub async fn execute(
    args: &CheckArgs,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let mut discovery = super::discovery(&config.plugins, args.dir.as_deref());
    let result = discovery.discover()?;

    let host = PluginHostService::spawn(super::manager(&config.plugins))?;
    let report = host.load_all(result).await?;

    let targets: Vec<String> = match &args.id {
        Some(id) if report.accepted.contains(id) => vec![id.clone()],
        Some(id) => {
            host.shutdown().await?;
            return Err(AppError::not_found(format!("Plugin '{}' not found", id)));
        }
        None => report.accepted.clone(),
    };

    let mut rows = Vec::with_capacity(targets.len());
    for id in &targets {
        let started = host.start(id).await?;
        let stopped = host.stop(id).await?;
        let unloaded = host.unload(id).await?;

        let error = started
            .as_ref()
            .and_then(|s| s.last_error.clone())
            .or_else(|| stopped.as_ref().and_then(|s| s.last_error.clone()))
            .unwrap_or_default();

        rows.push(CheckRow {
            id: id.clone(),
            start: state_name(started.map(|s| s.state)),
            stop: state_name(stopped.map(|s| s.state)),
            unloaded,
            error,
        });
    }

    host.shutdown().await?;
    output::print_list(&rows, format);

    let failed = rows.iter().filter(|r| !r.passed()).count();
    if failed > 0 {
        return Err(AppError::plugin(format!(
            "{} of {} plugin(s) failed the lifecycle check",
            failed,
            rows.len()
        )));
    }

    if format == OutputFormat::Table {
        output::print_success(&format!("{} plugin(s) passed", rows.len()));
    }
    Ok(())
}

fn state_name(state: Option<PluginState>) -> String {
    state.map(|s| s.as_str().to_string()).unwrap_or_else(|| "-".to_string())
}
