use std::fmt;

use thiserror::Error;

use crate::module_system::context::ModuleContext;

/// Failure reported by a module activator.
///
/// Activators return explicit errors instead of unwinding: a module's
/// failure must never propagate uncontrolled through the registry's
/// state-machine code.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ActivatorError {
    message: String,
}

impl ActivatorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for ActivatorError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ActivatorError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// The per-module lifecycle hook invoked by the module registry.
///
/// `load` runs exactly once per start (module state STARTING) and `unload`
/// exactly once per stop (state STOPPING). The activator instance is
/// created when its module starts and dropped when it stops; state that
/// must survive a stop/start cycle belongs in a registered service, not in
/// the activator.
pub trait ModuleActivator: Send + Sync {
    /// Called while the module is STARTING. Registering services and
    /// listeners through `context` is the usual work done here. An error
    /// rolls the module back to RESOLVED.
    fn load(&mut self, context: &ModuleContext) -> Result<(), ActivatorError>;

    /// Called while the module is STOPPING. Errors are logged and
    /// swallowed so shutdown always completes; services still owned by the
    /// module are unregistered by the registry afterwards either way.
    fn unload(&mut self, context: &ModuleContext) -> Result<(), ActivatorError>;
}

/// Factory producing a fresh activator instance at each module start.
pub type ActivatorFactory = Box<dyn Fn() -> Box<dyn ModuleActivator> + Send + Sync>;

impl fmt::Debug for dyn ModuleActivator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleActivator").finish_non_exhaustive()
    }
}

/// Expose a module's activator entry point from a `cdylib` module crate.
///
/// The expansion defines the `ferrule_create_activator` symbol the loader
/// resolves by default (a manifest's `ActivatorClass` header can point at a
/// differently named symbol if the macro invocation is wrapped manually).
///
/// ```ignore
/// struct MyActivator;
/// impl ModuleActivator for MyActivator { /* ... */ }
///
/// ferrule_core::export_activator!(MyActivator::default());
/// ```
#[macro_export]
macro_rules! export_activator {
    ($ctor:expr) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn ferrule_create_activator()
        -> *mut Box<dyn $crate::module_system::ModuleActivator> {
            Box::into_raw(Box::new(
                Box::new($ctor) as Box<dyn $crate::module_system::ModuleActivator>
            ))
        }
    };
}
