use crate::service_registry::ServiceReference;

/// Module lifecycle transitions reported to module listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleEventKind {
    /// Module was installed into the registry
    Installed,
    /// Module reached the RESOLVED state
    Resolved,
    /// Module activator loaded successfully, module is ACTIVE
    Started,
    /// Module was stopped and returned to RESOLVED
    Stopped,
    /// Module was removed from the registry
    Uninstalled,
}

impl ModuleEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModuleEventKind::Installed => "module.installed",
            ModuleEventKind::Resolved => "module.resolved",
            ModuleEventKind::Started => "module.started",
            ModuleEventKind::Stopped => "module.stopped",
            ModuleEventKind::Uninstalled => "module.uninstalled",
        }
    }
}

/// A module lifecycle event
#[derive(Debug, Clone)]
pub struct ModuleEvent {
    kind: ModuleEventKind,
    module: String,
}

impl ModuleEvent {
    pub fn new(kind: ModuleEventKind, module: &str) -> Self {
        Self {
            kind,
            module: module.to_string(),
        }
    }

    pub fn kind(&self) -> ModuleEventKind {
        self.kind
    }

    /// Symbolic name of the module the event concerns
    pub fn module(&self) -> &str {
        &self.module
    }
}

/// Service registry transitions reported to service listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEventKind {
    /// A service was registered
    Registered,
    /// A registration's properties were replaced
    Modified,
    /// A service is about to be unregistered; its reference is still usable
    /// for the duration of the dispatch
    Unregistering,
}

impl ServiceEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceEventKind::Registered => "service.registered",
            ServiceEventKind::Modified => "service.modified",
            ServiceEventKind::Unregistering => "service.unregistering",
        }
    }
}

/// A service registry event carrying a reference to the affected registration
#[derive(Debug, Clone)]
pub struct ServiceEvent {
    kind: ServiceEventKind,
    reference: ServiceReference,
}

impl ServiceEvent {
    pub fn new(kind: ServiceEventKind, reference: ServiceReference) -> Self {
        Self { kind, reference }
    }

    pub fn kind(&self) -> ServiceEventKind {
        self.kind
    }

    pub fn reference(&self) -> &ServiceReference {
        &self.reference
    }
}
