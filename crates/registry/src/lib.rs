//! Session Registry - identifier allocation and keyed handle storage
//!
//! A process-local store that issues numeric identifiers to automation
//! sessions and resolves an identifier back to the live handle across
//! independent, stateless requests.
//!
//! # Design
//!
//! 1. **Ordered map, not a hand-rolled tree**: `BTreeMap` gives O(log n)
//!    insert/lookup/remove for any insertion order plus in-order iteration
//! 2. **Every absence is explicit**: lookup and remove return `Option`,
//!    duplicate insertion is a checked error
//! 3. **Sync and runtime-agnostic**: short critical sections behind std
//!    locks, no I/O, callable from any handler model

pub mod allocator;
pub mod error;
pub mod registry;

/// Session identifier handed out by the allocator.
pub type SessionId = u64;

pub use allocator::{IdAllocator, IdSpace};
pub use error::{RegistryError, Result};
pub use registry::SessionRegistry;
