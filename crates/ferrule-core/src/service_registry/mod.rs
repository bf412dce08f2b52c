//! # Ferrule Core Service Registry
//!
//! A thread-safe directory of published service implementations, keyed by
//! an explicit interface identity string. Modules publish implementations
//! with a property bag (including an integer ranking); consumers look them
//! up through weak, revocable [`ServiceReference`] handles or observe them
//! with a [`ServiceTracker`].
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`properties`]**: property bags, well-known keys (`service.id`,
//!   `service.ranking`) and the programmatic [`ServiceFilter`] predicate.
//! - **[`registration`]**: the registration record, the owner-side
//!   [`ServiceRegistration`] handle and the weak [`ServiceReference`].
//! - **[`registry`]**: the [`ServiceRegistry`] itself: publish, rank-ordered
//!   lookup, unregister, per-module cleanup.
//! - **[`tracker`]**: [`ServiceTracker`], a live view over matching services
//!   with add/modify/remove callbacks.
//! - **[`error`]**: [`ServiceRegistryError`](error::ServiceRegistryError).

pub mod error;
pub mod properties;
pub mod registration;
pub mod registry;
pub mod tracker;

pub use properties::{PropertyValue, ServiceFilter, ServiceProperties, SERVICE_ID, SERVICE_RANKING};
pub use registration::{ServiceObject, ServiceReference, ServiceRegistration};
pub use registry::ServiceRegistry;
pub use tracker::{ServiceTracker, TrackerCustomizer};
