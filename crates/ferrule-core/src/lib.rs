//! # Ferrule Core
//!
//! `ferrule-core` is the module/service runtime a plugin-composed desktop
//! application is built on: it installs module manifests, resolves and
//! orders inter-module dependencies, drives each module's lifecycle state
//! machine, and hosts a concurrent, filterable service registry with
//! tracker (observer) semantics. GUI views, renderers and algorithm
//! bundles live in separate module crates and interact with the runtime
//! exclusively through the [`ModuleContext`] handed to their activator.

pub mod event;
pub mod kernel;
pub mod module_system;
pub mod service_registry;

// Re-export key public types for easier use by the application binary and modules
pub use kernel::CoreRuntime;
pub use kernel::error::{Error, Result};
pub use module_system::{
    ActivatorError, Module, ModuleActivator, ModuleContext, ModuleManifest, ModuleRegistry,
    ModuleState,
};
pub use service_registry::{
    ServiceFilter, ServiceProperties, ServiceReference, ServiceRegistration, ServiceRegistry,
    ServiceTracker, TrackerCustomizer,
};
pub use event::{EventDispatcher, ListenerId, ModuleEvent, ServiceEvent};
