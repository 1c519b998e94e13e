//! Error types for allocator and registry operations
//!
//! Simple, flat error hierarchy. Not-found is a normal result at the
//! registry layer (`Option`); the `NotFound` variant exists for callers
//! resolving an externally supplied id.

use thiserror::Error;

use crate::SessionId;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Identifier space exhausted: {capacity} ids live")]
    CapacityExhausted { capacity: u64 },

    #[error("Session id already registered: {0}")]
    DuplicateId(SessionId),

    #[error("Unknown session: {0}")]
    NotFound(SessionId),
}
