use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::event::error::EventSystemError;
use crate::event::types::{ModuleEvent, ServiceEvent};
use crate::service_registry::ServiceFilter;

/// Type for listener identifiers
pub type ListenerId = u64;

type ModuleCallback = Arc<dyn Fn(&ModuleEvent) + Send + Sync>;
type ServiceCallback = Arc<dyn Fn(&ServiceEvent) + Send + Sync>;

struct ModuleListenerEntry {
    id: ListenerId,
    /// Restrict delivery to events for one symbolic name
    module: Option<String>,
    callback: ModuleCallback,
}

struct ServiceListenerEntry {
    id: ListenerId,
    /// Restrict delivery to events for one interface identity
    interface: Option<String>,
    /// Restrict delivery to events whose registration properties match
    filter: Option<ServiceFilter>,
    callback: ServiceCallback,
}

#[derive(Default)]
struct Listeners {
    module: Vec<ModuleListenerEntry>,
    service: Vec<ServiceListenerEntry>,
}

/// Synchronous event dispatcher for module and service events.
///
/// Listener storage is an ordered collection; dispatch snapshots the
/// matching callbacks under the lock and then invokes them with the lock
/// released, so removing a listener during dispatch never affects the
/// in-progress iteration, and a callback may re-enter the dispatcher.
pub struct EventDispatcher {
    listeners: Mutex<Listeners>,
    next_listener_id: AtomicU64,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (module_count, service_count) = match self.listeners.lock() {
            Ok(guard) => (guard.module.len(), guard.service.len()),
            Err(_) => (0, 0),
        };
        f.debug_struct("EventDispatcher")
            .field("module_listeners", &module_count)
            .field("service_listeners", &service_count)
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Listeners::default()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> ListenerId {
        self.next_listener_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a module event listener, optionally restricted to one module.
    pub fn add_module_listener<F>(&self, module: Option<&str>, callback: F) -> ListenerId
    where
        F: Fn(&ModuleEvent) + Send + Sync + 'static,
    {
        let id = self.next_id();
        let mut listeners = self.listeners.lock().unwrap();
        listeners.module.push(ModuleListenerEntry {
            id,
            module: module.map(str::to_string),
            callback: Arc::new(callback),
        });
        id
    }

    /// Register a service event listener, optionally restricted to one
    /// interface identity and/or a property filter.
    pub fn add_service_listener<F>(
        &self,
        interface: Option<&str>,
        filter: Option<ServiceFilter>,
        callback: F,
    ) -> ListenerId
    where
        F: Fn(&ServiceEvent) + Send + Sync + 'static,
    {
        let id = self.next_id();
        let mut listeners = self.listeners.lock().unwrap();
        listeners.service.push(ServiceListenerEntry {
            id,
            interface: interface.map(str::to_string),
            filter,
            callback: Arc::new(callback),
        });
        id
    }

    /// Remove a listener of either kind by id.
    pub fn remove_listener(&self, id: ListenerId) -> Result<(), EventSystemError> {
        let mut listeners = self.listeners.lock().unwrap();
        let module_len = listeners.module.len();
        let service_len = listeners.service.len();
        listeners.module.retain(|entry| entry.id != id);
        listeners.service.retain(|entry| entry.id != id);
        if listeners.module.len() < module_len || listeners.service.len() < service_len {
            Ok(())
        } else {
            Err(EventSystemError::UnknownListener(id))
        }
    }

    /// Fan a module event out to all matching listeners, synchronously, in
    /// registration order.
    pub fn dispatch_module_event(&self, event: &ModuleEvent) {
        let callbacks: Vec<ModuleCallback> = {
            let listeners = self.listeners.lock().unwrap();
            listeners
                .module
                .iter()
                .filter(|entry| match &entry.module {
                    Some(name) => name == event.module(),
                    None => true,
                })
                .map(|entry| Arc::clone(&entry.callback))
                .collect()
        };
        for callback in callbacks {
            Self::invoke(event.kind().name(), || callback(event));
        }
    }

    /// Fan a service event out to all matching listeners, synchronously, in
    /// registration order.
    pub fn dispatch_service_event(&self, event: &ServiceEvent) {
        // One properties snapshot per event, shared by all filter checks.
        let properties = event.reference().properties();
        let callbacks: Vec<ServiceCallback> = {
            let listeners = self.listeners.lock().unwrap();
            listeners
                .service
                .iter()
                .filter(|entry| {
                    if let Some(interface) = &entry.interface {
                        if interface != event.reference().interface() {
                            return false;
                        }
                    }
                    match (&entry.filter, &properties) {
                        (None, _) => true,
                        (Some(filter), Some(props)) => filter.matches(props),
                        (Some(_), None) => false,
                    }
                })
                .map(|entry| Arc::clone(&entry.callback))
                .collect()
        };
        for callback in callbacks {
            Self::invoke(event.kind().name(), || callback(event));
        }
    }

    /// Run one listener callback; a panicking listener is logged and must
    /// not prevent delivery to subsequent listeners.
    fn invoke<F: FnOnce()>(event_name: &str, callback: F) {
        if let Err(panic_payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
            let detail = panic_payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "<non-string panic payload>".to_string());
            log::error!("Listener for '{}' panicked: {}", event_name, detail);
        }
    }

    /// Number of currently registered listeners (both kinds).
    pub fn listener_count(&self) -> usize {
        let listeners = self.listeners.lock().unwrap();
        listeners.module.len() + listeners.service.len()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
