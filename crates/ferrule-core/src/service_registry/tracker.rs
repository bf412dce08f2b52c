use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use crate::event::dispatcher::ListenerId;
use crate::event::types::{ServiceEvent, ServiceEventKind};
use crate::service_registry::properties::ServiceFilter;
use crate::service_registry::registration::ServiceReference;
use crate::service_registry::registry::ServiceRegistry;

/// Callbacks a tracker consumer supplies to observe its live view.
pub trait TrackerCustomizer: Send + Sync {
    /// A matching service became tracked.
    fn added(&self, reference: &ServiceReference);

    /// A tracked registration's properties changed (still matching).
    fn modified(&self, _reference: &ServiceReference) {}

    /// A tracked service is going away. Invoked synchronously before the
    /// registration becomes unusable, so the reference may still be
    /// dereferenced from inside this callback.
    fn removed(&self, reference: &ServiceReference);
}

struct TrackerState {
    registry: ServiceRegistry,
    interface: String,
    filter: Option<ServiceFilter>,
    customizer: Arc<dyn TrackerCustomizer>,
    /// Tracked references keyed by registration sequence number. The key
    /// set deduplicates racing event/snapshot deliveries.
    tracked: Mutex<BTreeMap<u64, ServiceReference>>,
    listener: Mutex<Option<ListenerId>>,
}

impl TrackerState {
    fn track(&self, reference: &ServiceReference) {
        let Some(id) = reference.id() else {
            return;
        };
        if reference.is_stale() {
            return;
        }
        let inserted = {
            let mut tracked = self.tracked.lock().unwrap();
            tracked.insert(id, reference.clone()).is_none()
        };
        // Callback runs outside the tracked-set lock so it may call back
        // into the tracker or the registry.
        if inserted {
            self.customizer.added(reference);
        }
    }

    fn untrack(&self, reference: &ServiceReference) {
        let Some(id) = reference.id() else {
            return;
        };
        let removed = {
            let mut tracked = self.tracked.lock().unwrap();
            tracked.remove(&id).is_some()
        };
        if removed {
            self.customizer.removed(reference);
        }
    }

    fn matches(&self, reference: &ServiceReference) -> bool {
        match (&self.filter, reference.properties()) {
            (None, _) => true,
            (Some(filter), Some(properties)) => filter.matches(&properties),
            (Some(_), None) => false,
        }
    }

    fn on_event(&self, event: &ServiceEvent) {
        let reference = event.reference();
        match event.kind() {
            ServiceEventKind::Registered => {
                if self.matches(reference) {
                    self.track(reference);
                }
            }
            ServiceEventKind::Modified => {
                // A property change can move a registration into or out of
                // the tracked set.
                if !self.matches(reference) {
                    self.untrack(reference);
                    return;
                }
                let already_tracked = match reference.id() {
                    Some(id) => self.tracked.lock().unwrap().contains_key(&id),
                    None => return,
                };
                if already_tracked {
                    self.customizer.modified(reference);
                } else {
                    self.track(reference);
                }
            }
            ServiceEventKind::Unregistering => self.untrack(reference),
        }
    }
}

/// A live, incrementally-updated view of the services matching one
/// interface identity and optional filter.
///
/// Between [`open`](Self::open) and [`close`](Self::close) the tracker
/// subscribes to the registry's service events and keeps its tracked set
/// current, invoking the customizer's callbacks synchronously on whichever
/// thread triggered the change.
pub struct ServiceTracker {
    state: Arc<TrackerState>,
}

impl ServiceTracker {
    pub fn new(
        registry: &ServiceRegistry,
        interface: &str,
        filter: Option<ServiceFilter>,
        customizer: Arc<dyn TrackerCustomizer>,
    ) -> Self {
        Self {
            state: Arc::new(TrackerState {
                registry: registry.clone(),
                interface: interface.to_string(),
                filter,
                customizer,
                tracked: Mutex::new(BTreeMap::new()),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to service events and seed the tracked set from a snapshot
    /// of the current matches, invoking `added` for each. Opening an
    /// already-open tracker is a no-op.
    ///
    /// The subscription is installed before the snapshot is taken; the
    /// tracked set deduplicates by registration id, so a registration that
    /// races `open` produces exactly one `added` callback.
    pub fn open(&self) {
        {
            let mut listener = self.state.listener.lock().unwrap();
            if listener.is_some() {
                return;
            }
            let weak: Weak<TrackerState> = Arc::downgrade(&self.state);
            let id = self.state.registry.dispatcher().add_service_listener(
                Some(&self.state.interface),
                None,
                move |event| {
                    if let Some(state) = weak.upgrade() {
                        state.on_event(event);
                    }
                },
            );
            *listener = Some(id);
        }
        let snapshot = self
            .state
            .registry
            .get_service_references(&self.state.interface, self.state.filter.as_ref());
        for reference in &snapshot {
            self.state.track(reference);
        }
    }

    /// Unsubscribe and invoke `removed` for every currently tracked
    /// reference, guaranteeing symmetric cleanup. Closing a closed tracker
    /// is a no-op.
    pub fn close(&self) {
        let listener = self.state.listener.lock().unwrap().take();
        let Some(id) = listener else {
            return;
        };
        if self.state.registry.dispatcher().remove_listener(id).is_err() {
            log::warn!(
                "Service tracker for '{}' had no registered listener on close",
                self.state.interface
            );
        }
        let drained: Vec<ServiceReference> = {
            let mut tracked = self.state.tracked.lock().unwrap();
            std::mem::take(&mut *tracked).into_values().collect()
        };
        for reference in &drained {
            self.state.customizer.removed(reference);
        }
    }

    /// Snapshot of the currently tracked references. Does not block event
    /// delivery beyond the copy itself.
    pub fn tracked_services(&self) -> Vec<ServiceReference> {
        self.state.tracked.lock().unwrap().values().cloned().collect()
    }

    pub fn tracked_count(&self) -> usize {
        self.state.tracked.lock().unwrap().len()
    }

    pub fn interface(&self) -> &str {
        &self.state.interface
    }
}

impl fmt::Debug for ServiceTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceTracker")
            .field("interface", &self.state.interface)
            .field("tracked", &self.tracked_count())
            .finish()
    }
}

impl Drop for ServiceTracker {
    fn drop(&mut self) {
        self.close();
    }
}
