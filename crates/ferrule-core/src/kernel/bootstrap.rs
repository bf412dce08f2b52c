//! # Ferrule Core Runtime Bootstrap
//!
//! [`CoreRuntime`] wires the three subsystems together (event dispatcher,
//! service registry, module registry) and owns the runtime lifecycle:
//! initialize, install modules from disk, shut down.

use std::path::Path;

use crate::event::dispatcher::EventDispatcher;
use crate::kernel::constants::{RUNTIME_NAME, RUNTIME_VERSION};
use crate::kernel::error::{Error, Result, RuntimePhase};
use crate::module_system::loader::{LibraryHandle, discover_manifests};
use crate::module_system::registry::ModuleRegistry;
use crate::service_registry::ServiceRegistry;
use std::sync::Arc;

/// The assembled runtime.
///
/// Construction wires the subsystems; nothing is usable for modules until
/// [`init`](Self::init) has run. [`shutdown`](Self::shutdown) stops every
/// active module in dependency order.
pub struct CoreRuntime {
    dispatcher: Arc<EventDispatcher>,
    services: ServiceRegistry,
    modules: ModuleRegistry,
    initialized: bool,
}

impl CoreRuntime {
    /// Create a new runtime with freshly wired subsystems.
    pub fn new() -> Self {
        log::info!("Initializing {} v{}", RUNTIME_NAME, RUNTIME_VERSION);
        let dispatcher = Arc::new(EventDispatcher::new());
        let services = ServiceRegistry::new(Arc::clone(&dispatcher));
        let modules = ModuleRegistry::new(services.clone(), Arc::clone(&dispatcher));
        Self {
            dispatcher,
            services,
            modules,
            initialized: false,
        }
    }

    /// Mark the runtime initialized. Calling it twice is an error.
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Err(Error::RuntimeLifecycle {
                phase: RuntimePhase::Init,
                message: "runtime is already initialized".to_string(),
            });
        }
        self.initialized = true;
        log::info!("{} runtime initialized", RUNTIME_NAME);
        Ok(())
    }

    /// Stop every active module (dependents before dependencies) and leave
    /// the runtime uninitialized. Module stop failures are logged by the
    /// module registry, never propagated.
    pub fn shutdown(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(Error::RuntimeLifecycle {
                phase: RuntimePhase::Shutdown,
                message: "runtime is not initialized".to_string(),
            });
        }
        log::info!("{} runtime shutting down", RUNTIME_NAME);
        self.modules.stop_all();
        self.initialized = false;
        log::info!("{} runtime shutdown complete", RUNTIME_NAME);
        Ok(())
    }

    /// Scan `dir` for module directories and install each discovered module.
    ///
    /// Manifests declaring an `ActivatorLibrary` are installed with the
    /// library opened relative to their module directory; manifests without
    /// one install as activator-less modules. A module that fails to install
    /// (bad library, duplicate name) is logged and skipped. Returns the
    /// number of modules installed.
    pub fn install_modules_from_directory(&self, dir: &Path) -> Result<usize> {
        let mut installed = 0;
        for (module_dir, manifest) in discover_manifests(dir)? {
            let name = manifest.symbolic_name().to_string();
            let library_name = manifest.activator_library().map(str::to_string);
            let result = match library_name {
                Some(library_name) => LibraryHandle::open(&module_dir.join(library_name))
                    .and_then(|library| self.modules.install_from_library(manifest, library)),
                None => self.modules.install(manifest),
            };
            match result {
                Ok(_) => installed += 1,
                Err(err) => {
                    log::warn!("Skipping module '{}': {}", name, err);
                }
            }
        }
        log::info!(
            "Installed {} module(s) from {}",
            installed,
            dir.display()
        );
        Ok(installed)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn module_registry(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn service_registry(&self) -> &ServiceRegistry {
        &self.services
    }

    pub fn event_dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }
}

impl Default for CoreRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CoreRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreRuntime")
            .field("initialized", &self.initialized)
            .field("modules", &self.modules.module_count())
            .finish()
    }
}
