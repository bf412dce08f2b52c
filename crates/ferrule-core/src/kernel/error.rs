//! # Ferrule Core Kernel Errors
//!
//! Defines the top-level [`Error`] enum for the runtime, aggregating the
//! typed per-subsystem errors (module system, service registry, event
//! system) plus failures of the runtime's own lifecycle.

use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::event::error::EventSystemError;
use crate::module_system::error::ModuleSystemError;
use crate::service_registry::error::ServiceRegistryError;

/// Top-level error type for the Ferrule runtime
#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed module system error
    #[error("Module system error: {0}")]
    ModuleSystem(#[from] ModuleSystemError),

    /// Specific, typed service registry error
    #[error("Service registry error: {0}")]
    ServiceRegistry(#[from] ServiceRegistryError),

    /// Specific, typed event system error
    #[error("Event system error: {0}")]
    EventSystem(#[from] EventSystemError),

    /// Error occurring during a runtime lifecycle phase.
    #[error("Runtime lifecycle error during {phase}: {message}")]
    RuntimeLifecycle {
        phase: RuntimePhase,
        message: String,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Represents a phase in the runtime's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum RuntimePhase {
    #[error("Init")]
    Init,
    #[error("Shutdown")]
    Shutdown,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
