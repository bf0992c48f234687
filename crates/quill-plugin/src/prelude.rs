//! Prelude for convenient imports.

pub use crate::api::context::{PluginContext, Registrar};
pub use crate::api::events::{PluginEvent, PluginListener};
pub use crate::api::host::EditorInfo;
pub use crate::exports::PluginExport;
pub use crate::registry::{Contribution, ContributionKind, ServiceId, ServiceInstance};
pub use crate::traits::{Plugin, PluginError};
pub use crate::types::{ActivationPolicy, PluginMetadata, RestartPolicy};

pub use crate::{export_plugins, plugin_metadata};
