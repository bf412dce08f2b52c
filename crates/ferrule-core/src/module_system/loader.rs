//! # Ferrule Core Module Loader
//!
//! Dynamic loading support: opening module libraries with `libloading`,
//! resolving activator entry points, and reading `manifest.json` files from
//! module directories on disk.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use serde::Deserialize;

use crate::module_system::error::ModuleSystemError;
use crate::module_system::manifest::{
    HEADER_ACTIVATOR_CLASS, HEADER_ACTIVATOR_LIBRARY, HEADER_MANIFEST_VERSION, HEADER_NAME,
    HEADER_REQUIRE_MODULE, HEADER_SYMBOLIC_NAME, HEADER_VENDOR, HEADER_VERSION, ModuleManifest,
};
use crate::module_system::traits::{ActivatorFactory, ModuleActivator};

/// File name of the per-module manifest inside a module directory
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// C ABI signature of a module's activator entry point, as emitted by the
/// `export_activator!` macro.
type ActivatorCreateFn = unsafe extern "C" fn() -> *mut Box<dyn ModuleActivator>;

/// An opened module library.
///
/// The inner [`Library`] is reference counted so activator factories can
/// keep the code resident for as long as an activator created from it may
/// still run; the handle itself is dropped when the module is uninstalled.
pub struct LibraryHandle {
    library: Arc<Library>,
    path: PathBuf,
}

impl LibraryHandle {
    /// Open a dynamic library from disk.
    ///
    /// # Safety
    ///
    /// Loading a library runs its initialization code. The path is trusted
    /// the same way the host process trusts any module it installs.
    pub fn open(path: &Path) -> Result<Self, ModuleSystemError> {
        let library = unsafe { Library::new(path) }.map_err(|err| {
            ModuleSystemError::LoadingError {
                path: path.to_path_buf(),
                message: err.to_string(),
            }
        })?;
        Ok(Self {
            library: Arc::new(library),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve `symbol` to an activator factory.
    ///
    /// The raw function pointer is copied out of the `Symbol` guard and the
    /// returned closure captures the `Arc<Library>`, so the library outlives
    /// every activator instance the factory produces.
    pub(crate) fn activator_factory(
        &self,
        symbol: &str,
    ) -> Result<ActivatorFactory, ModuleSystemError> {
        let create: ActivatorCreateFn = unsafe {
            self.library
                .get::<ActivatorCreateFn>(symbol.as_bytes())
                .map(|sym| *sym)
                .map_err(|err| ModuleSystemError::LoadingError {
                    path: self.path.clone(),
                    message: format!("missing activator symbol '{}': {}", symbol, err),
                })?
        };
        let library = Arc::clone(&self.library);
        Ok(Box::new(move || {
            let _keep_loaded = &library;
            // The entry point hands over ownership of a heap-allocated
            // trait-object box.
            unsafe { *Box::from_raw(create()) }
        }))
    }
}

impl std::fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryHandle")
            .field("path", &self.path)
            .finish()
    }
}

/// On-disk JSON shape of `manifest.json`, converted into the generic header
/// table before parsing.
#[derive(Debug, Deserialize)]
struct RawModuleManifest {
    symbolic_name: String,
    version: String,
    manifest_version: Option<String>,
    name: Option<String>,
    vendor: Option<String>,
    activator_library: Option<String>,
    activator_class: Option<String>,
    #[serde(default)]
    require_module: Vec<String>,
}

impl RawModuleManifest {
    fn into_headers(self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(HEADER_SYMBOLIC_NAME.to_string(), self.symbolic_name);
        headers.insert(HEADER_VERSION.to_string(), self.version);
        // Omitted on purpose when absent so parsing reports the missing
        // header instead of silently assuming a format version.
        if let Some(manifest_version) = self.manifest_version {
            headers.insert(HEADER_MANIFEST_VERSION.to_string(), manifest_version);
        }
        if let Some(name) = self.name {
            headers.insert(HEADER_NAME.to_string(), name);
        }
        if let Some(vendor) = self.vendor {
            headers.insert(HEADER_VENDOR.to_string(), vendor);
        }
        if let Some(library) = self.activator_library {
            headers.insert(HEADER_ACTIVATOR_LIBRARY.to_string(), library);
        }
        if let Some(class) = self.activator_class {
            headers.insert(HEADER_ACTIVATOR_CLASS.to_string(), class);
        }
        if !self.require_module.is_empty() {
            headers.insert(
                HEADER_REQUIRE_MODULE.to_string(),
                self.require_module.join(","),
            );
        }
        headers
    }
}

/// Read and parse a `manifest.json` file.
pub fn load_manifest_file(path: &Path) -> Result<ModuleManifest, ModuleSystemError> {
    let content = fs::read_to_string(path).map_err(|err| ModuleSystemError::LoadingError {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let raw: RawModuleManifest =
        serde_json::from_str(&content).map_err(|err| ModuleSystemError::LoadingError {
            path: path.to_path_buf(),
            message: format!("invalid manifest JSON: {}", err),
        })?;
    Ok(ModuleManifest::parse(&raw.into_headers())?)
}

/// Scan `dir` for module directories containing a `manifest.json` and parse
/// each one.
///
/// Returns `(module_dir, manifest)` pairs sorted by path for deterministic
/// install order. Directories whose manifest fails to parse are logged and
/// skipped; an unreadable top-level directory is an error.
pub fn discover_manifests(
    dir: &Path,
) -> Result<Vec<(PathBuf, ModuleManifest)>, ModuleSystemError> {
    let entries = fs::read_dir(dir).map_err(|err| ModuleSystemError::LoadingError {
        path: dir.to_path_buf(),
        message: err.to_string(),
    })?;

    let mut discovered = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ModuleSystemError::LoadingError {
            path: dir.to_path_buf(),
            message: err.to_string(),
        })?;
        let module_dir = entry.path();
        if !module_dir.is_dir() {
            continue;
        }
        let manifest_path = module_dir.join(MANIFEST_FILE_NAME);
        if !manifest_path.is_file() {
            continue;
        }
        match load_manifest_file(&manifest_path) {
            Ok(manifest) => discovered.push((module_dir, manifest)),
            Err(err) => {
                log::warn!(
                    "Skipping module directory {}: {}",
                    module_dir.display(),
                    err
                );
            }
        }
    }
    discovered.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(discovered)
}
