//! # Ferrule Core Event System Errors

use thiserror::Error;

use crate::event::ListenerId;

#[derive(Debug, Error)]
pub enum EventSystemError {
    #[error("No listener registered with id {0}")]
    UnknownListener(ListenerId),
}
