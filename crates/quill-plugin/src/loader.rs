//! Dynamic plugin loader using `libloading` (feature-gated).

#[cfg(feature = "dynamic")]
pub mod dynamic_loader {
    use std::fs;
    use std::io::ErrorKind;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use libloading::{Library, Symbol};
    use tracing::{info, warn};

    use quill_core::error::AppError;
    use quill_core::result::AppResult;

    use crate::api::context::PluginContext;
    use crate::discovery::{DiscoveredUnit, Discovery, DiscoveryResult};
    use crate::execution::{ExecutionContextHandle, ReleaseAction, ReleaseError};
    use crate::ffi::abi::{ABI_VERSION_SYMBOL, AbiVersionFn, ENTRY_SYMBOL, PluginEntryFn};
    use crate::ffi::safety::{call_entry, negotiate};
    use crate::traits::{Plugin, PluginError};
    use crate::types::{ActivationPolicy, PluginMetadata, PluginOrigin, RestartPolicy};

    /// A plugin that keeps its library mapped for as long as it lives.
    ///
    /// `inner` is declared first so it drops before the library reference.
    struct LibraryPlugin {
        inner: Box<dyn Plugin>,
        _library: Arc<Library>,
    }

    impl Plugin for LibraryPlugin {
        fn describe(&self) -> PluginMetadata {
            self.inner.describe()
        }

        fn activate(&mut self, ctx: &mut PluginContext) -> Result<(), PluginError> {
            self.inner.activate(ctx)
        }

        fn deactivate(&mut self) -> Result<(), PluginError> {
            self.inner.deactivate()
        }

        fn activation_policy(&self) -> ActivationPolicy {
            self.inner.activation_policy()
        }

        fn restart_policy(&self) -> RestartPolicy {
            self.inner.restart_policy()
        }
    }

    /// Discovers plugins in shared libraries (.so / .dll / .dylib) found
    /// directly inside one directory.
    #[derive(Debug)]
    pub struct LibraryDiscovery {
        directory: PathBuf,
    }

    impl LibraryDiscovery {
        /// Creates a discovery over `directory`.
        ///
        /// # Safety
        /// Discovering runs initialization code from every library in the
        /// directory. Only point this at trusted plugins built against the
        /// same `quill-plugin` version as the host.
        pub unsafe fn new(directory: impl Into<PathBuf>) -> Self {
            Self {
                directory: directory.into(),
            }
        }

        /// Returns the scanned directory.
        pub fn directory(&self) -> &Path {
            &self.directory
        }

        fn library_paths(&self) -> AppResult<Vec<PathBuf>> {
            let entries = match fs::read_dir(&self.directory) {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    info!(
                        directory = %self.directory.display(),
                        "Plugin directory does not exist, nothing to load"
                    );
                    return Ok(Vec::new());
                }
                Err(e) => return Err(e.into()),
            };

            let mut paths: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| is_library_file(path))
                .collect();
            paths.sort();
            Ok(paths)
        }
    }

    impl Discovery for LibraryDiscovery {
        fn discover(&mut self) -> AppResult<DiscoveryResult> {
            let mut result = DiscoveryResult::new();

            for path in self.library_paths()? {
                // SAFETY: the caller of `LibraryDiscovery::new` vouched for
                // every library in the directory.
                match unsafe { open_library(&path) } {
                    Ok(units) => result.extend(units),
                    Err(e) => warn!(
                        path = %path.display(),
                        error = %e,
                        "Skipping plugin library"
                    ),
                }
            }

            info!(
                directory = %self.directory.display(),
                plugins = result.len(),
                "Plugin libraries scanned"
            );
            Ok(result)
        }
    }

    fn is_library_file(path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext == std::env::consts::DLL_EXTENSION)
    }

    /// Opens one library and wraps every plugin it exports.
    ///
    /// All units share one handle; the first carries the release action.
    unsafe fn open_library(path: &Path) -> AppResult<DiscoveryResult> {
        let label = path.display().to_string();

        // SAFETY: upheld by the caller.
        let library = unsafe { Library::new(path) }
            .map_err(|e| AppError::loader(format!("Failed to load '{label}': {e}")))?;

        let export = {
            // SAFETY: symbol types match the contract in `ffi::abi`.
            let version_fn: Symbol<AbiVersionFn> = unsafe { library.get(ABI_VERSION_SYMBOL) }
                .map_err(|e| AppError::loader(format!("'{label}' is not a Quill plugin: {e}")))?;
            unsafe { negotiate(&label, *version_fn) }?;

            let entry: Symbol<PluginEntryFn> = unsafe { library.get(ENTRY_SYMBOL) }
                .map_err(|e| AppError::loader(format!("'{label}' has no entry point: {e}")))?;
            unsafe { call_entry(&label, *entry) }?
        };

        if export.is_empty() {
            warn!(path = %label, "Plugin library exports no plugins");
            return Ok(DiscoveryResult::new());
        }

        let library = Arc::new(library);
        let handle = ExecutionContextHandle::new(label.as_str());
        let release = release_action(library.clone());

        let mut units = DiscoveryResult::new();
        let mut release = Some(release);
        for plugin in export.into_plugins() {
            let wrapped = LibraryPlugin {
                inner: plugin,
                _library: library.clone(),
            };
            let mut unit =
                DiscoveredUnit::new(Box::new(wrapped), PluginOrigin::External, handle.clone())
                    .with_source_path(path);
            if let Some(release) = release.take() {
                unit = unit.with_release(release);
            }
            units.push(unit);
        }

        info!(path = %label, plugins = units.len(), "Plugin library opened");
        Ok(units)
    }

    /// Closes the library once nothing else holds it.
    ///
    /// Plugins hold their own reference, so dropping this action early never
    /// unmaps code a live plugin still runs.
    fn release_action(library: Arc<Library>) -> ReleaseAction {
        Box::new(move || match Arc::try_unwrap(library) {
            Ok(library) => library.close().map_err(|e| ReleaseError::new(e.to_string())),
            Err(_) => Err(ReleaseError::new(
                "library still referenced, closing when the last reference drops",
            )),
        })
    }
}

/// Stub loader when dynamic feature is not enabled.
#[cfg(not(feature = "dynamic"))]
pub mod dynamic_loader {
    use std::path::{Path, PathBuf};

    use tracing::debug;

    use quill_core::result::AppResult;

    use crate::discovery::{Discovery, DiscoveryResult};

    /// Stub discovery that never finds anything.
    #[derive(Debug)]
    pub struct LibraryDiscovery {
        directory: PathBuf,
    }

    impl LibraryDiscovery {
        /// Creates a stub discovery.
        ///
        /// # Safety
        /// Always safe; `unsafe` only to match the `dynamic` build.
        pub unsafe fn new(directory: impl Into<PathBuf>) -> Self {
            Self {
                directory: directory.into(),
            }
        }

        /// Returns the configured directory.
        pub fn directory(&self) -> &Path {
            &self.directory
        }
    }

    impl Discovery for LibraryDiscovery {
        fn discover(&mut self) -> AppResult<DiscoveryResult> {
            debug!(
                directory = %self.directory.display(),
                "Dynamic loading disabled, skipping plugin libraries"
            );
            Ok(DiscoveryResult::new())
        }
    }
}

pub use dynamic_loader::LibraryDiscovery;
