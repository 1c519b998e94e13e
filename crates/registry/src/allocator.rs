//! Identifier allocation
//!
//! Design decisions:
//! 1. Monotonic u64 counter by default - the space never runs out in practice
//! 2. Bounded mode caps *live* ids, released ids go back to a free pool
//! 3. A full bounded space fails immediately with CapacityExhausted.
//!    Never sample-and-retry: with a small space that loops forever once
//!    concurrent sessions approach the range size.

use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;

use crate::error::{RegistryError, Result};
use crate::SessionId;

/// The set of values session identifiers may be drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSpace {
    /// Monotonically increasing u64, starting at 1. Released ids are not
    /// reused, so every id a process ever hands out is distinct.
    Unbounded,

    /// At most `capacity` ids live at once. Released ids return to a free
    /// pool and are reused before the counter advances.
    Bounded(u64),
}

struct AllocState {
    /// Next counter value to hand out when the free pool is empty
    next: SessionId,

    /// Released ids available for reuse (bounded mode only)
    free: BTreeSet<SessionId>,

    /// Every id currently held by a live session
    live: HashSet<SessionId>,
}

/// Hands out identifiers guaranteed unique among all currently-live sessions.
///
/// Safe under concurrent callers: two simultaneous `allocate` calls never
/// return the same id. All state sits behind one mutex; no operation blocks
/// on anything but that lock.
pub struct IdAllocator {
    space: IdSpace,
    state: Mutex<AllocState>,
}

impl IdAllocator {
    pub fn new(space: IdSpace) -> Self {
        Self {
            space,
            state: Mutex::new(AllocState {
                next: 1,
                free: BTreeSet::new(),
                live: HashSet::new(),
            }),
        }
    }

    /// Allocate an identifier not held by any live session.
    ///
    /// Fails with `CapacityExhausted` when a bounded space is fully
    /// occupied. Never blocks beyond the internal lock, never retries.
    pub fn allocate(&self) -> Result<SessionId> {
        let mut state = self.lock();

        if let IdSpace::Bounded(capacity) = self.space {
            if state.live.len() as u64 >= capacity {
                tracing::warn!(capacity, "identifier space exhausted");
                return Err(RegistryError::CapacityExhausted { capacity });
            }
        }

        let id = match state.free.pop_first() {
            Some(reused) => reused,
            None => {
                let id = state.next;
                state.next = state.next.wrapping_add(1);
                id
            }
        };

        state.live.insert(id);
        tracing::debug!(id, "allocated session id");
        Ok(id)
    }

    /// Return an identifier to the pool. Releasing an id that is not
    /// currently allocated is a no-op.
    pub fn release(&self, id: SessionId) {
        let mut state = self.lock();
        if state.live.remove(&id) {
            if matches!(self.space, IdSpace::Bounded(_)) {
                state.free.insert(id);
            }
            tracing::debug!(id, "released session id");
        }
    }

    /// Number of identifiers currently held by live sessions.
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AllocState> {
        // A poisoned lock means a panic mid-update; allocator state is a
        // counter and two sets, all left consistent at every await-free step.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(IdSpace::Unbounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn sequential_allocations_are_distinct() {
        let alloc = IdAllocator::new(IdSpace::Unbounded);
        let mut seen = HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(alloc.allocate().unwrap()));
        }
        assert_eq!(alloc.live_count(), 100);
    }

    #[test]
    fn bounded_space_exhausts_instead_of_looping() {
        let alloc = IdAllocator::new(IdSpace::Bounded(2));
        let a = alloc.allocate().unwrap();
        let b = alloc.allocate().unwrap();
        assert_ne!(a, b);

        assert_eq!(
            alloc.allocate(),
            Err(RegistryError::CapacityExhausted { capacity: 2 })
        );
    }

    #[test]
    fn bounded_space_reuses_released_ids() {
        let alloc = IdAllocator::new(IdSpace::Bounded(2));
        let a = alloc.allocate().unwrap();
        let _b = alloc.allocate().unwrap();

        alloc.release(a);
        let c = alloc.allocate().unwrap();
        assert_eq!(c, a);

        // Pool is full again
        assert!(alloc.allocate().is_err());
    }

    #[test]
    fn release_is_idempotent() {
        let alloc = IdAllocator::new(IdSpace::Bounded(2));
        let a = alloc.allocate().unwrap();

        alloc.release(a);
        alloc.release(a);
        alloc.release(9999);

        // Double release must not double the free pool
        let x = alloc.allocate().unwrap();
        let y = alloc.allocate().unwrap();
        assert_ne!(x, y);
        assert!(alloc.allocate().is_err());
    }

    #[test]
    fn unbounded_does_not_reuse_released_ids() {
        let alloc = IdAllocator::new(IdSpace::Unbounded);
        let a = alloc.allocate().unwrap();
        alloc.release(a);
        let b = alloc.allocate().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn concurrent_allocations_are_distinct() {
        let alloc = Arc::new(IdAllocator::new(IdSpace::Unbounded));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let alloc = alloc.clone();
            handles.push(std::thread::spawn(move || {
                (0..125)
                    .map(|_| alloc.allocate().unwrap())
                    .collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 1000);
        assert_eq!(alloc.live_count(), 1000);
    }
}
