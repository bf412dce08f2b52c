use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use crate::event::dispatcher::EventDispatcher;
use crate::module_system::context::ModuleContext;
use crate::module_system::loader::LibraryHandle;
use crate::module_system::manifest::ModuleManifest;
use crate::module_system::traits::{ActivatorFactory, ModuleActivator};
use crate::service_registry::ServiceRegistry;
use semver::Version;

/// Lifecycle state of an installed module.
///
/// `Installed -> Resolved -> Starting -> Active -> Stopping -> Resolved`
/// loops; `Uninstalled` is terminal. Only install/uninstall are reachable
/// from outside; the other transitions are driven by the module registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Installed,
    Resolved,
    Starting,
    Active,
    Stopping,
    Uninstalled,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleState::Installed => "installed",
            ModuleState::Resolved => "resolved",
            ModuleState::Starting => "starting",
            ModuleState::Active => "active",
            ModuleState::Stopping => "stopping",
            ModuleState::Uninstalled => "uninstalled",
        };
        write!(f, "{}", name)
    }
}

pub(crate) struct ModuleShared {
    manifest: ModuleManifest,
    state: RwLock<ModuleState>,
    /// Produces a fresh activator at each start; retained across cycles.
    factory: Mutex<Option<ActivatorFactory>>,
    /// The live activator instance, present only between STARTING and
    /// STOPPING.
    activator: Mutex<Option<Box<dyn ModuleActivator>>>,
    /// Keeps a dynamically loaded module library resident while installed.
    library: Mutex<Option<LibraryHandle>>,
    context: ModuleContext,
}

/// A state-machine instance representing one installed module.
///
/// `Module` is a cheap clonable handle; all lifecycle mutation goes through
/// the [`ModuleRegistry`](crate::module_system::ModuleRegistry).
#[derive(Clone)]
pub struct Module {
    shared: Arc<ModuleShared>,
}

impl Module {
    pub(crate) fn new(
        manifest: ModuleManifest,
        services: ServiceRegistry,
        dispatcher: Arc<EventDispatcher>,
        factory: Option<ActivatorFactory>,
        library: Option<LibraryHandle>,
    ) -> Self {
        let shared = Arc::new_cyclic(|weak| {
            let context = ModuleContext::new(
                weak.clone(),
                manifest.symbolic_name(),
                services,
                dispatcher,
            );
            ModuleShared {
                manifest,
                state: RwLock::new(ModuleState::Installed),
                factory: Mutex::new(factory),
                activator: Mutex::new(None),
                library: Mutex::new(library),
                context,
            }
        });
        Self { shared }
    }

    pub fn symbolic_name(&self) -> &str {
        self.shared.manifest.symbolic_name()
    }

    pub fn version(&self) -> &Version {
        self.shared.manifest.version()
    }

    pub fn manifest(&self) -> &ModuleManifest {
        &self.shared.manifest
    }

    pub fn state(&self) -> ModuleState {
        *self.shared.state.read().unwrap()
    }

    /// The module's private handle onto the runtime
    pub fn context(&self) -> &ModuleContext {
        &self.shared.context
    }

    pub(crate) fn set_state(&self, state: ModuleState) {
        *self.shared.state.write().unwrap() = state;
    }

    /// Instantiate a fresh activator from the factory, if one was supplied
    /// at install.
    pub(crate) fn create_activator(&self) -> Option<Box<dyn ModuleActivator>> {
        self.shared
            .factory
            .lock()
            .unwrap()
            .as_ref()
            .map(|factory| factory())
    }

    pub(crate) fn store_activator(&self, activator: Box<dyn ModuleActivator>) {
        *self.shared.activator.lock().unwrap() = Some(activator);
    }

    pub(crate) fn take_activator(&self) -> Option<Box<dyn ModuleActivator>> {
        self.shared.activator.lock().unwrap().take()
    }

    pub(crate) fn take_library(&self) -> Option<LibraryHandle> {
        self.shared.library.lock().unwrap().take()
    }
}

impl ModuleShared {
    pub(crate) fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    pub(crate) fn state(&self) -> ModuleState {
        *self.state.read().unwrap()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("symbolic_name", &self.symbolic_name())
            .field("version", &self.version().to_string())
            .field("state", &self.state())
            .finish()
    }
}
