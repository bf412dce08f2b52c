use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::event::dispatcher::EventDispatcher;
use crate::event::types::{ServiceEvent, ServiceEventKind};
use crate::service_registry::error::ServiceRegistryError;
use crate::service_registry::properties::{ServiceFilter, ServiceProperties, SERVICE_ID};
use crate::service_registry::registration::{
    RegistrationRecord, ServiceObject, ServiceReference, ServiceRegistration,
};

/// Shared state behind the cheap-to-clone [`ServiceRegistry`] handle.
pub(crate) struct RegistryShared {
    /// interface identity -> registrations ordered by (ranking desc, id asc)
    entries: RwLock<HashMap<String, Vec<Arc<RegistrationRecord>>>>,
    next_service_id: AtomicU64,
    dispatcher: Arc<EventDispatcher>,
}

impl RegistryShared {
    fn insert_sorted(records: &mut Vec<Arc<RegistrationRecord>>, record: Arc<RegistrationRecord>) {
        records.push(record);
        Self::sort(records);
    }

    fn sort(records: &mut [Arc<RegistrationRecord>]) {
        records.sort_by(|a, b| b.ranking().cmp(&a.ranking()).then(a.id().cmp(&b.id())));
    }

    pub(crate) fn set_properties(
        self: &Arc<Self>,
        record: &Arc<RegistrationRecord>,
        mut properties: ServiceProperties,
    ) -> Result<(), ServiceRegistryError> {
        if record.is_unregistered() {
            return Err(ServiceRegistryError::AlreadyUnregistered {
                id: record.id(),
                interface: record.interface().to_string(),
            });
        }
        properties.insert(SERVICE_ID, record.id() as i64);
        let _guard = record.dispatch_guard();
        {
            let mut entries = self.entries.write().unwrap();
            record.replace_properties(properties);
            if let Some(records) = entries.get_mut(record.interface()) {
                Self::sort(records);
            }
        }
        let event = ServiceEvent::new(ServiceEventKind::Modified, ServiceReference::new(record));
        self.dispatcher.dispatch_service_event(&event);
        Ok(())
    }

    pub(crate) fn unregister_record(
        self: &Arc<Self>,
        record: &Arc<RegistrationRecord>,
    ) -> Result<(), ServiceRegistryError> {
        // Held across mark/dispatch/remove so this whole sequence cannot
        // interleave with the record's in-flight Registered dispatch.
        let _guard = record.dispatch_guard();
        if !record.mark_unregistered() {
            return Err(ServiceRegistryError::AlreadyUnregistered {
                id: record.id(),
                interface: record.interface().to_string(),
            });
        }

        // Deliver Unregistering while the service is still dereferenceable,
        // so a tracker's `removed` callback may take a last look at it.
        let event = ServiceEvent::new(
            ServiceEventKind::Unregistering,
            ServiceReference::new(record),
        );
        self.dispatcher.dispatch_service_event(&event);

        {
            let mut entries = self.entries.write().unwrap();
            if let Some(records) = entries.get_mut(record.interface()) {
                records.retain(|candidate| candidate.id() != record.id());
                if records.is_empty() {
                    entries.remove(record.interface());
                }
            }
        }
        record.clear_service();
        log::debug!(
            "Unregistered service #{} for interface '{}'",
            record.id(),
            record.interface()
        );
        Ok(())
    }
}

/// Thread-safe directory of published service implementations.
///
/// Lookups take the table's read lock and may run concurrently; mutations
/// take the write lock. Events are dispatched synchronously after the lock
/// is released and before the triggering call returns, so re-entrant
/// registration from inside a listener callback is supported. A per-record
/// guard keeps one registration's events in lifecycle order even under
/// cross-thread races (Unregistering never overtakes an in-flight
/// Registered).
#[derive(Clone)]
pub struct ServiceRegistry {
    shared: Arc<RegistryShared>,
}

impl ServiceRegistry {
    pub fn new(dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                entries: RwLock::new(HashMap::new()),
                next_service_id: AtomicU64::new(1),
                dispatcher,
            }),
        }
    }

    pub(crate) fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.shared.dispatcher
    }

    /// Publish a service implementation under an interface identity on
    /// behalf of `owner`. The `Registered` event is delivered to matching
    /// listeners before this returns.
    pub fn register_service(
        &self,
        owner: &str,
        interface: &str,
        service: ServiceObject,
        mut properties: ServiceProperties,
    ) -> ServiceRegistration {
        let id = self.shared.next_service_id.fetch_add(1, Ordering::Relaxed);
        properties.insert(SERVICE_ID, id as i64);
        let record = Arc::new(RegistrationRecord::new(
            id, interface, owner, properties, service,
        ));
        {
            // The guard spans insert and dispatch: a concurrent unregister
            // (module cleanup) that finds the fresh table entry queues behind
            // it, so no listener can see Unregistering ahead of Registered
            // for the same record.
            let _guard = record.dispatch_guard();
            {
                let mut entries = self.shared.entries.write().unwrap();
                RegistryShared::insert_sorted(
                    entries.entry(interface.to_string()).or_default(),
                    Arc::clone(&record),
                );
            }
            log::debug!(
                "Module '{}' registered service #{} for interface '{}'",
                owner,
                id,
                interface
            );
            let event =
                ServiceEvent::new(ServiceEventKind::Registered, ServiceReference::new(&record));
            self.shared.dispatcher.dispatch_service_event(&event);
        }
        ServiceRegistration::new(record, Arc::downgrade(&self.shared))
    }

    /// The single best match for an interface: highest ranking first, then
    /// earliest registration. Absence of a match is not an error.
    pub fn get_service_reference(
        &self,
        interface: &str,
        filter: Option<&ServiceFilter>,
    ) -> Option<ServiceReference> {
        let entries = self.shared.entries.read().unwrap();
        entries.get(interface).and_then(|records| {
            records
                .iter()
                .find(|record| Self::record_matches(record, filter))
                .map(ServiceReference::new)
        })
    }

    /// All matches in lookup order, as a snapshot taken at call time.
    pub fn get_service_references(
        &self,
        interface: &str,
        filter: Option<&ServiceFilter>,
    ) -> Vec<ServiceReference> {
        let entries = self.shared.entries.read().unwrap();
        entries
            .get(interface)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| Self::record_matches(record, filter))
                    .map(ServiceReference::new)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn record_matches(record: &Arc<RegistrationRecord>, filter: Option<&ServiceFilter>) -> bool {
        if record.is_unregistered() {
            return false;
        }
        match filter {
            Some(filter) => filter.matches(&record.properties_snapshot()),
            None => true,
        }
    }

    /// Dereference a service reference.
    pub fn get_service(
        &self,
        reference: &ServiceReference,
    ) -> Result<ServiceObject, ServiceRegistryError> {
        reference.service()
    }

    /// Dereference and downcast a service reference to a concrete type.
    pub fn get_typed_service<T: Any + Send + Sync>(
        &self,
        reference: &ServiceReference,
    ) -> Result<Arc<T>, ServiceRegistryError> {
        reference.service_as::<T>()
    }

    /// Remove every registration owned by `module`, delivering the usual
    /// `Unregistering` events. Used when the owning module stops.
    pub fn unregister_all_for_module(&self, module: &str) {
        let owned: Vec<Arc<RegistrationRecord>> = {
            let entries = self.shared.entries.read().unwrap();
            entries
                .values()
                .flatten()
                .filter(|record| record.owner() == module)
                .cloned()
                .collect()
        };
        if owned.is_empty() {
            return;
        }
        log::debug!(
            "Unregistering {} service(s) owned by module '{}'",
            owned.len(),
            module
        );
        for record in owned {
            // A concurrent explicit unregister may have won the race.
            if let Err(ServiceRegistryError::AlreadyUnregistered { .. }) =
                self.shared.unregister_record(&record)
            {
                continue;
            }
        }
    }

    /// Number of live registrations for an interface (primarily for tests
    /// and diagnostics).
    pub fn registration_count(&self, interface: &str) -> usize {
        let entries = self.shared.entries.read().unwrap();
        entries.get(interface).map_or(0, |records| records.len())
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interfaces = self.shared.entries.read().map(|e| e.len()).unwrap_or(0);
        f.debug_struct("ServiceRegistry")
            .field("interfaces", &interfaces)
            .finish_non_exhaustive()
    }
}
