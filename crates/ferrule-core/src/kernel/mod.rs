//! # Ferrule Core Kernel
//!
//! The `kernel` module forms the heart of the `ferrule-core` runtime. It is
//! responsible for wiring the three core components together and for the
//! process-wide lifecycle of the runtime itself.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Runtime Bootstrapping**: [`CoreRuntime`](bootstrap::CoreRuntime) is the
//!   explicit, process-wide context object. It owns the event dispatcher, the
//!   service registry and the module registry, and exposes `init`/`shutdown`
//!   so lifetime and test isolation stay explicit (no hidden globals).
//! - **Core Constants**: runtime identity and manifest format constants in
//!   the `constants` submodule.
//! - **Error Handling**: the top-level [`Error`](error::Error) enum and the
//!   `Result` alias in the `error` submodule, aggregating the per-subsystem
//!   error types.

pub mod bootstrap;
pub mod constants;
pub mod error;

pub use bootstrap::CoreRuntime;
pub use error::{Error, Result};
