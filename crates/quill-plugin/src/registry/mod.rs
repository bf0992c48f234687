//! Host-side capability tables plugins register into.
//!
//! Every entry is tagged with the owning plugin id when it is inserted, so
//! the host can purge a plugin's registrations in bulk without the plugin
//! tracking what it registered.

pub mod contributions;
pub mod services;
pub mod strings;

pub use contributions::{Contribution, ContributionEntry, ContributionKind, ContributionRegistry};
pub use services::{ServiceId, ServiceInstance, ServiceRegistry};
pub use strings::StringTable;
