//! Integration tests for the plugin author macros.

mod helpers;

use quill_plugin::ffi::safety::{call_entry, negotiate};
use quill_plugin::prelude::*;
use quill_plugin::{DiscoveredUnit, ExecutionContextHandle, PluginManager, PluginOrigin};

use helpers::TestPlugin;

export_plugins!(
    TestPlugin::new("exported-a").0,
    TestPlugin::new("exported-b").0
);

#[test]
fn test_plugin_metadata_defaults_version_to_crate() {
    let meta = plugin_metadata!(id: "spell", name: "Spell Checker");
    assert_eq!(meta.version, env!("CARGO_PKG_VERSION"));
    assert!(meta.description.is_empty());

    let meta = plugin_metadata!(
        id: "spell",
        name: "Spell Checker",
        version: "2.1.0",
        description: "Underlines unknown words",
    );
    assert_eq!(meta.version, "2.1.0");
    assert_eq!(meta.description, "Underlines unknown words");
}

#[test]
fn test_exported_symbols_pass_host_checks() {
    assert_eq!(
        quill_plugin_abi_version(),
        quill_plugin::ffi::QUILL_PLUGIN_ABI_VERSION
    );
    assert!(unsafe { negotiate("self", quill_plugin_abi_version) }.is_ok());

    let export = unsafe { call_entry("self", quill_plugin_entry) }.unwrap();
    assert_eq!(export.len(), 2);

    let handle = ExecutionContextHandle::new("self");
    let mut manager = PluginManager::new();
    for plugin in export.into_plugins() {
        manager.load(DiscoveredUnit::new(plugin, PluginOrigin::External, handle.clone()));
    }
    manager.start_all();

    let ids: Vec<_> = manager.list_plugins().into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec!["exported-a", "exported-b"]);
    assert!(manager.list_plugins().iter().all(|p| p.is_active()));
}
