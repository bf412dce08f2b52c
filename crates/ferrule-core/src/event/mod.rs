//! # Ferrule Core Event System
//!
//! Synchronous fan-out of module lifecycle and service registry events to
//! registered listeners. There is no queue and no scheduler: `dispatch_*`
//! invokes every matching listener on the calling thread, in registration
//! order, before it returns. Events are a closed set of tagged variants
//! ([`ModuleEvent`], [`ServiceEvent`]) rather than an open trait hierarchy.

pub mod dispatcher;
pub mod error;
pub mod types;

pub use dispatcher::{EventDispatcher, ListenerId};
pub use types::{ModuleEvent, ModuleEventKind, ServiceEvent, ServiceEventKind};
