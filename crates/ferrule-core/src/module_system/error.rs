//! # Ferrule Core Module System Errors
//!
//! [`ModuleSystemError`] covers everything that can go wrong while
//! installing, resolving, starting, stopping or uninstalling modules:
//! malformed manifests, duplicate symbolic names, missing or cyclic
//! dependencies, activator failures, and dynamic-library loading problems.

use std::path::PathBuf;

use thiserror::Error;

use crate::module_system::dependency::DependencyError;
use crate::module_system::manifest::ManifestError;
use crate::module_system::module::ModuleState;
use crate::module_system::traits::ActivatorError;

#[derive(Debug, Error)]
pub enum ModuleSystemError {
    #[error("Malformed manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Module '{0}' is already installed")]
    DuplicateSymbolicName(String),

    #[error("Module '{0}' is not installed")]
    ModuleNotFound(String),

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error("Activator for module '{module}' failed to load: {source}")]
    ActivatorFailed {
        module: String,
        #[source]
        source: ActivatorError,
    },

    #[error("Module '{module}' still has active dependents: {}", .dependents.join(", "))]
    DependentModulesActive {
        module: String,
        dependents: Vec<String>,
    },

    #[error("Module '{module}' is {actual}, expected {expected}")]
    InvalidState {
        module: String,
        expected: ModuleState,
        actual: ModuleState,
    },

    #[error("Failed to load module library '{}': {message}", .path.display())]
    LoadingError { path: PathBuf, message: String },
}
