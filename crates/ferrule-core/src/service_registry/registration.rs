use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::service_registry::error::ServiceRegistryError;
use crate::service_registry::properties::ServiceProperties;
use crate::service_registry::registry::RegistryShared;

/// Type-erased service implementation, keyed by an explicit interface
/// identity string rather than RTTI.
pub type ServiceObject = Arc<dyn Any + Send + Sync>;

/// The registry's record of one published service.
///
/// The registry holds the strong owning reference to the implementation for
/// the registration's lifetime; references hand out weak links only. On
/// unregistration the implementation is dropped but the record itself stays
/// alive as long as outstanding [`ServiceReference`]s point at it, so a
/// stale dereference fails instead of dangling.
pub(crate) struct RegistrationRecord {
    id: u64,
    interface: String,
    owner: String,
    properties: Mutex<ServiceProperties>,
    service: Mutex<Option<ServiceObject>>,
    unregistered: AtomicBool,
    /// Serializes event delivery for this record: `Unregistering` must not
    /// overtake a `Registered` that is still on its way to the listeners.
    dispatch: Mutex<()>,
}

impl RegistrationRecord {
    pub(crate) fn new(
        id: u64,
        interface: &str,
        owner: &str,
        properties: ServiceProperties,
        service: ServiceObject,
    ) -> Self {
        Self {
            id,
            interface: interface.to_string(),
            owner: owner.to_string(),
            properties: Mutex::new(properties),
            service: Mutex::new(Some(service)),
            unregistered: AtomicBool::new(false),
            dispatch: Mutex::new(()),
        }
    }

    /// Taken around every event dispatch concerning this record. Lock order:
    /// the guard is never acquired while the registry's table lock is held.
    /// A listener must not unregister the registration it is currently being
    /// notified about.
    pub(crate) fn dispatch_guard(&self) -> MutexGuard<'_, ()> {
        self.dispatch.lock().unwrap()
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn interface(&self) -> &str {
        &self.interface
    }

    pub(crate) fn owner(&self) -> &str {
        &self.owner
    }

    pub(crate) fn ranking(&self) -> i32 {
        self.properties.lock().unwrap().ranking()
    }

    pub(crate) fn properties_snapshot(&self) -> ServiceProperties {
        self.properties.lock().unwrap().clone()
    }

    pub(crate) fn replace_properties(&self, properties: ServiceProperties) {
        *self.properties.lock().unwrap() = properties;
    }

    pub(crate) fn service(&self) -> Option<ServiceObject> {
        self.service.lock().unwrap().clone()
    }

    /// First caller wins; returns false on a repeated unregister.
    pub(crate) fn mark_unregistered(&self) -> bool {
        !self.unregistered.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_unregistered(&self) -> bool {
        self.unregistered.load(Ordering::SeqCst)
    }

    /// Drop the owning reference to the implementation. Called after the
    /// `Unregistering` event has been delivered.
    pub(crate) fn clear_service(&self) {
        self.service.lock().unwrap().take();
    }
}

impl fmt::Debug for RegistrationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRecord")
            .field("id", &self.id)
            .field("interface", &self.interface)
            .field("owner", &self.owner)
            .field("unregistered", &self.unregistered.load(Ordering::SeqCst))
            .finish()
    }
}

/// Handle returned to the registering module for one published service.
///
/// Dropping the handle does not unregister the service; the module either
/// calls [`unregister`](Self::unregister) explicitly or the registry cleans
/// up when the owning module stops.
pub struct ServiceRegistration {
    record: Arc<RegistrationRecord>,
    registry: Weak<RegistryShared>,
}

impl ServiceRegistration {
    pub(crate) fn new(record: Arc<RegistrationRecord>, registry: Weak<RegistryShared>) -> Self {
        Self { record, registry }
    }

    pub fn id(&self) -> u64 {
        self.record.id()
    }

    pub fn interface(&self) -> &str {
        self.record.interface()
    }

    pub fn properties(&self) -> ServiceProperties {
        self.record.properties_snapshot()
    }

    /// A weak reference to this registration
    pub fn reference(&self) -> ServiceReference {
        ServiceReference::new(&self.record)
    }

    /// Replace the registration's properties, re-ranking it among
    /// same-interface registrations and emitting a `Modified` event.
    pub fn set_properties(&self, properties: ServiceProperties) -> Result<(), ServiceRegistryError> {
        let registry = self
            .registry
            .upgrade()
            .ok_or(ServiceRegistryError::RegistryShutDown)?;
        registry.set_properties(&self.record, properties)
    }

    /// Remove the registration from the registry. The `Unregistering` event
    /// is delivered before the service becomes unusable; a second call fails
    /// with [`ServiceRegistryError::AlreadyUnregistered`].
    pub fn unregister(&self) -> Result<(), ServiceRegistryError> {
        let registry = self
            .registry
            .upgrade()
            .ok_or(ServiceRegistryError::RegistryShutDown)?;
        registry.unregister_record(&self.record)
    }
}

impl fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("record", &self.record)
            .finish()
    }
}

/// A weak, copyable handle onto a registration: relation only, never
/// ownership. Becomes stale once the registration is removed; dereferencing
/// a stale reference fails with
/// [`ServiceRegistryError::StaleReference`] rather than crashing.
#[derive(Clone)]
pub struct ServiceReference {
    record: Weak<RegistrationRecord>,
    interface: String,
}

impl ServiceReference {
    pub(crate) fn new(record: &Arc<RegistrationRecord>) -> Self {
        Self {
            record: Arc::downgrade(record),
            interface: record.interface().to_string(),
        }
    }

    /// Interface identity the registration was published under
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Registration sequence number, if the record still exists
    pub fn id(&self) -> Option<u64> {
        self.record.upgrade().map(|record| record.id())
    }

    /// Symbolic name of the module that registered the service
    pub fn owner(&self) -> Option<String> {
        self.record.upgrade().map(|record| record.owner().to_string())
    }

    /// Snapshot of the registration's properties, if the record still exists
    pub fn properties(&self) -> Option<ServiceProperties> {
        self.record
            .upgrade()
            .map(|record| record.properties_snapshot())
    }

    pub fn ranking(&self) -> Option<i32> {
        self.record.upgrade().map(|record| record.ranking())
    }

    /// Whether the backing registration has been removed
    pub fn is_stale(&self) -> bool {
        match self.record.upgrade() {
            Some(record) => record.service().is_none(),
            None => true,
        }
    }

    /// Dereference to the owning registry's implementation object.
    pub fn service(&self) -> Result<ServiceObject, ServiceRegistryError> {
        self.record
            .upgrade()
            .and_then(|record| record.service())
            .ok_or_else(|| ServiceRegistryError::StaleReference {
                interface: self.interface.clone(),
            })
    }

    /// Dereference and downcast to a concrete service type.
    pub fn service_as<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ServiceRegistryError> {
        self.service()?
            .downcast::<T>()
            .map_err(|_| ServiceRegistryError::TypeMismatch {
                interface: self.interface.clone(),
            })
    }
}

impl PartialEq for ServiceReference {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.record, &other.record)
    }
}

impl Eq for ServiceReference {}

impl fmt::Debug for ServiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceReference")
            .field("interface", &self.interface)
            .field("id", &self.id())
            .field("stale", &self.is_stale())
            .finish()
    }
}
