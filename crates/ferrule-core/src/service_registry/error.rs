//! # Ferrule Core Service Registry Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceRegistryError {
    /// The registration backing a reference was removed; the reference can
    /// no longer be dereferenced.
    #[error("Service reference for interface '{interface}' is stale")]
    StaleReference { interface: String },

    /// `unregister` was called on a registration that is already gone.
    #[error("Service registration #{id} for interface '{interface}' is already unregistered")]
    AlreadyUnregistered { id: u64, interface: String },

    /// The implementation behind a reference is not of the requested type.
    #[error("Service for interface '{interface}' is not of the requested type")]
    TypeMismatch { interface: String },

    /// The registry backing a registration handle no longer exists.
    #[error("Service registry has shut down")]
    RegistryShutDown,
}
