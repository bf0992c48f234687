//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use quill_plugin::PluginSnapshot;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// One plugin as a table row
#[derive(Debug, Serialize, Tabled)]
pub struct PluginRow {
    /// Plugin id
    #[tabled(rename = "ID")]
    pub id: String,
    /// Display name
    #[tabled(rename = "Name")]
    pub name: String,
    /// Version
    #[tabled(rename = "Version")]
    pub version: String,
    /// Built-in or external
    #[tabled(rename = "Origin")]
    pub origin: String,
    /// Lifecycle state
    #[tabled(rename = "State")]
    pub state: String,
    /// Library path, if any
    #[tabled(rename = "Source")]
    pub source: String,
    /// Last recorded error
    #[tabled(rename = "Error")]
    pub error: String,
}

impl From<&PluginSnapshot> for PluginRow {
    fn from(snapshot: &PluginSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            name: snapshot.name.clone(),
            version: snapshot.version.clone(),
            origin: snapshot.origin.to_string(),
            state: snapshot.state.to_string(),
            source: snapshot
                .source_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
            error: snapshot.last_error.clone().unwrap_or_default(),
        }
    }
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                let table = Table::new(items).to_string();
                println!("{}", table);
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
            println!("{}", json);
        }
    }
}

/// Print a single item in the selected format
pub fn print_item<T: Serialize + std::fmt::Debug>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            println!("{:#?}", item);
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(item).unwrap_or_else(|_| "{}".to_string());
            println!("{}", json);
        }
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {}", msg);
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{}:", key), value);
}
