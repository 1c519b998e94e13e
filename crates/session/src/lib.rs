//! Session Lifecycle Supervision
//!
//! Glue between the request layer and the `registry` crate: one supervisor
//! per process hands out session ids, resolves them back to live handles,
//! and owns the two teardown paths the surrounding system needs - explicit
//! close and idle expiry.
//!
//! # Architecture
//!
//! 1. **Explicit state, no globals**: the supervisor is built once at
//!    startup and cloned into every handler
//! 2. **Opaque handles**: `H` is whatever the automation layer produces;
//!    disposal goes through the `DisposeHandle` seam
//! 3. **Absence is a value**: unknown ids surface as `NotFound`, never as
//!    a usable default the caller then dereferences

pub mod events;
pub mod supervisor;
pub mod sweeper;

pub use events::{EventBus, SessionEvent};
pub use registry::{IdAllocator, IdSpace, RegistryError, Result, SessionId, SessionRegistry};
pub use supervisor::{Supervisor, SupervisorConfig};
pub use sweeper::{spawn_sweeper, DisposeHandle, DropDisposer};
