//! # Ferrule Core Module System
//!
//! The module lifecycle layer: manifests, dependency resolution, the module
//! state machine, per-module contexts, activator traits, and dynamic loading.
//!
//! Modules are installed into a [`ModuleRegistry`], resolved against their
//! declared requirements, and started in dependency order. An active
//! module's [`ModuleActivator`] has published its services through its
//! [`ModuleContext`]; stopping the module tears them down again.

pub mod context;
pub mod dependency;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod module;
pub mod registry;
pub mod traits;

#[cfg(test)]
mod tests;

pub use context::ModuleContext;
pub use dependency::{DependencyError, DependencyGraph};
pub use error::ModuleSystemError;
pub use loader::{LibraryHandle, MANIFEST_FILE_NAME, discover_manifests, load_manifest_file};
pub use manifest::{ManifestError, ModuleManifest};
pub use module::{Module, ModuleState};
pub use registry::ModuleRegistry;
pub use traits::{ActivatorError, ActivatorFactory, ModuleActivator};
