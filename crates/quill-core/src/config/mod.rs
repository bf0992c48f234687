//! Host configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Every section has defaults, so an empty or missing file
//! yields a usable configuration.

pub mod logging;
pub mod plugin;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use self::logging::LoggingConfig;
pub use self::plugin::PluginConfig;

use crate::error::AppError;

/// Prefix for environment variable overrides (`QUILL__PLUGINS__DIRECTORY`).
const ENV_PREFIX: &str = "QUILL";

/// Root host configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Plugin system settings.
    #[serde(default)]
    pub plugins: PluginConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `QUILL__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(environment())
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Load configuration from a single explicit file plus environment overrides.
    ///
    /// Unlike [`AppConfig::load`], the file is required to exist.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(environment())
            .build()
            .map_err(|e| {
                AppError::configuration(format!(
                    "Failed to read config '{}': {e}",
                    path.display()
                ))
            })?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp config file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let config = AppConfig::load_from(file.path()).unwrap();

        assert_eq!(config.plugins.directory, "./plugins");
        assert!(config.plugins.auto_load);
        assert!(config.plugins.auto_start);
        assert!(config.plugins.disabled.is_empty());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_sections_override_defaults() {
        let file = write_config(
            r#"
            [plugins]
            directory = "/opt/quill/plugins"
            auto_start = false
            disabled = ["spellcheck", "git-gutter"]

            [logging]
            level = "debug"
            format = "json"
            "#,
        );
        let config = AppConfig::load_from(file.path()).unwrap();

        assert_eq!(config.plugins.directory, "/opt/quill/plugins");
        assert!(config.plugins.auto_load);
        assert!(!config.plugins.auto_start);
        assert_eq!(config.plugins.disabled, vec!["spellcheck", "git-gutter"]);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = AppConfig::load_from("/nonexistent/quill/config.toml").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Configuration);
    }
}
