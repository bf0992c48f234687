//! Convenience macros for plugin development.

/// Builds a [`PluginMetadata`](crate::types::PluginMetadata).
///
/// The version defaults to the calling crate's `CARGO_PKG_VERSION`.
///
/// # Example
/// ```rust,ignore
/// let meta = plugin_metadata!(
///     id: "spellcheck",
///     name: "Spell Checker",
///     description: "Underlines unknown words"
/// );
/// ```
#[macro_export]
macro_rules! plugin_metadata {
    (
        id: $id:expr,
        name: $name:expr,
        version: $version:expr
        $(, description: $desc:expr)?
        $(,)?
    ) => {{
        let metadata = $crate::types::PluginMetadata::new($id, $name, $version);
        $( let metadata = metadata.with_description($desc); )?
        metadata
    }};
    (
        id: $id:expr,
        name: $name:expr
        $(, description: $desc:expr)?
        $(,)?
    ) => {
        $crate::plugin_metadata!(
            id: $id,
            name: $name,
            version: env!("CARGO_PKG_VERSION")
            $(, description: $desc)?
        )
    };
}

/// Exports plugins from a `cdylib` crate.
///
/// Generates the two symbols the host looks up: the ABI version and the
/// entry point returning one instance of each listed plugin.
///
/// # Example
/// ```rust,ignore
/// export_plugins!(SpellChecker::default(), WordCount::new());
/// ```
#[macro_export]
macro_rules! export_plugins {
    ($($plugin:expr),+ $(,)?) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn quill_plugin_abi_version() -> u32 {
            $crate::ffi::abi::QUILL_PLUGIN_ABI_VERSION
        }

        #[unsafe(no_mangle)]
        pub fn quill_plugin_entry() -> $crate::exports::PluginExport {
            let mut export = $crate::exports::PluginExport::new();
            $( export.push(::std::boxed::Box::new($plugin)); )+
            export
        }
    };
}
