use std::fmt;
use std::sync::{Arc, Weak};

use semver::Version;

use crate::event::dispatcher::{EventDispatcher, ListenerId};
use crate::event::error::EventSystemError;
use crate::event::types::{ModuleEvent, ServiceEvent};
use crate::module_system::module::{ModuleShared, ModuleState};
use crate::service_registry::error::ServiceRegistryError;
use crate::service_registry::{
    ServiceFilter, ServiceObject, ServiceProperties, ServiceReference, ServiceRegistration,
    ServiceRegistry,
};

/// The per-module handle through which a module interacts with the runtime:
/// publish and look up services, subscribe to events, and read its own
/// metadata.
///
/// Every context is owned by exactly one module and holds only a weak link
/// back to it, so an outstanding context never keeps an uninstalled module
/// alive.
#[derive(Clone)]
pub struct ModuleContext {
    module: Weak<ModuleShared>,
    symbolic_name: String,
    services: ServiceRegistry,
    dispatcher: Arc<EventDispatcher>,
}

impl ModuleContext {
    pub(crate) fn new(
        module: Weak<ModuleShared>,
        symbolic_name: &str,
        services: ServiceRegistry,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            module,
            symbolic_name: symbolic_name.to_string(),
            services,
            dispatcher,
        }
    }

    /// Symbolic name of the owning module
    pub fn symbolic_name(&self) -> &str {
        &self.symbolic_name
    }

    /// Version of the owning module, if it is still installed
    pub fn module_version(&self) -> Option<Version> {
        self.module
            .upgrade()
            .map(|module| module.manifest().version().clone())
    }

    /// Current lifecycle state of the owning module; `Uninstalled` once the
    /// module is gone.
    pub fn module_state(&self) -> ModuleState {
        self.module
            .upgrade()
            .map(|module| module.state())
            .unwrap_or(ModuleState::Uninstalled)
    }

    /// Publish a service implementation on behalf of the owning module.
    pub fn register_service(
        &self,
        interface: &str,
        service: ServiceObject,
        properties: ServiceProperties,
    ) -> ServiceRegistration {
        self.services
            .register_service(&self.symbolic_name, interface, service, properties)
    }

    /// Best match for an interface, or `None`.
    pub fn get_service_reference(
        &self,
        interface: &str,
        filter: Option<&ServiceFilter>,
    ) -> Option<ServiceReference> {
        self.services.get_service_reference(interface, filter)
    }

    /// All matches for an interface, in ranking order.
    pub fn get_service_references(
        &self,
        interface: &str,
        filter: Option<&ServiceFilter>,
    ) -> Vec<ServiceReference> {
        self.services.get_service_references(interface, filter)
    }

    /// Dereference a service reference.
    pub fn get_service(
        &self,
        reference: &ServiceReference,
    ) -> Result<ServiceObject, ServiceRegistryError> {
        self.services.get_service(reference)
    }

    /// Subscribe to module lifecycle events.
    pub fn add_module_listener<F>(&self, module: Option<&str>, callback: F) -> ListenerId
    where
        F: Fn(&ModuleEvent) + Send + Sync + 'static,
    {
        self.dispatcher.add_module_listener(module, callback)
    }

    /// Subscribe to service registry events.
    pub fn add_service_listener<F>(
        &self,
        interface: Option<&str>,
        filter: Option<ServiceFilter>,
        callback: F,
    ) -> ListenerId
    where
        F: Fn(&ServiceEvent) + Send + Sync + 'static,
    {
        self.dispatcher.add_service_listener(interface, filter, callback)
    }

    /// Remove a previously added listener.
    pub fn remove_listener(&self, id: ListenerId) -> Result<(), EventSystemError> {
        self.dispatcher.remove_listener(id)
    }

    /// The service registry this context publishes into (for trackers).
    pub fn service_registry(&self) -> &ServiceRegistry {
        &self.services
    }
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("module", &self.symbolic_name)
            .field("state", &self.module_state())
            .finish()
    }
}
