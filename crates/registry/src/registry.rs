//! Session registry - the live mapping from SessionId to session handle
//!
//! Design decisions:
//! 1. `BTreeMap` behind one `RwLock`: O(log n) keyed access regardless of
//!    insertion order, and ordered enumeration comes with the structure.
//!    An unbalanced tree degenerates to a list under the monotone ids the
//!    allocator produces; a plain hash map loses the ordering.
//! 2. Handles are opaque. The registry stores and returns them, nothing else.
//! 3. Lookup stays on the read lock. The per-entry last-access stamp is an
//!    atomic, so refreshing it needs no writer.

use std::collections::btree_map::Entry as MapEntry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::error::{RegistryError, Result};
use crate::SessionId;

struct Entry<H> {
    handle: H,

    /// Millis since the registry's epoch, refreshed on every lookup
    last_access: AtomicU64,
}

/// Ordered, keyed store of live session handles.
///
/// `H` is whatever the caller uses as a session handle; in practice an
/// `Arc` around the automation-session object. The registry never inspects
/// it. Exactly one handle is associated with a given id at any time.
pub struct SessionRegistry<H> {
    epoch: Instant,
    inner: RwLock<BTreeMap<SessionId, Entry<H>>>,
}

impl<H: Clone> SessionRegistry<H> {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            inner: RwLock::new(BTreeMap::new()),
        }
    }

    /// Add a new entry. Fails with `DuplicateId` if the id is already live.
    ///
    /// A duplicate means the allocator contract was violated somewhere; it
    /// is surfaced as a checked error, never routed silently into the map.
    pub fn insert(&self, id: SessionId, handle: H) -> Result<()> {
        let now = self.now_millis();
        let mut map = self.write();

        match map.entry(id) {
            MapEntry::Occupied(_) => {
                tracing::warn!(id, "insert rejected: id already registered");
                Err(RegistryError::DuplicateId(id))
            }
            MapEntry::Vacant(slot) => {
                slot.insert(Entry {
                    handle,
                    last_access: AtomicU64::new(now),
                });
                tracing::debug!(id, "session registered");
                Ok(())
            }
        }
    }

    /// Resolve an id to its handle, refreshing the entry's last-access
    /// stamp. Returns `None` for unknown or already-removed ids; callers
    /// must handle that case, there is no default handle.
    pub fn lookup(&self, id: SessionId) -> Option<H> {
        let now = self.now_millis();
        let map = self.read();

        map.get(&id).map(|entry| {
            entry.last_access.store(now, Ordering::Relaxed);
            entry.handle.clone()
        })
    }

    /// Delete an entry and hand its handle back so the caller can dispose
    /// the underlying resource. `None` when the id is not live; removing an
    /// absent id is not an error.
    pub fn remove(&self, id: SessionId) -> Option<H> {
        let removed = self.write().remove(&id).map(|entry| entry.handle);
        if removed.is_some() {
            tracing::debug!(id, "session removed");
        }
        removed
    }

    /// Visit every live entry in ascending id order.
    pub fn for_each_ordered(&self, mut visit: impl FnMut(SessionId, &H)) {
        let map = self.read();
        for (id, entry) in map.iter() {
            visit(*id, &entry.handle);
        }
    }

    /// Delete an entry only if its last access is still at least
    /// `threshold` ago, re-checked under the write lock. `None` when the
    /// id is absent or was looked up since the caller's idle scan; a
    /// session resolved between scan and reap stays live.
    pub fn remove_if_idle(&self, id: SessionId, threshold: Duration) -> Option<H> {
        let now = self.now_millis();
        let threshold = threshold.as_millis() as u64;
        let mut map = self.write();

        let still_idle = map.get(&id).map_or(false, |entry| {
            now.saturating_sub(entry.last_access.load(Ordering::Relaxed)) >= threshold
        });
        if !still_idle {
            return None;
        }

        let removed = map.remove(&id).map(|entry| entry.handle);
        if removed.is_some() {
            tracing::debug!(id, "idle session removed");
        }
        removed
    }

    /// Ids of entries whose last access is at least `threshold` ago,
    /// ascending. Input for the expiry sweep.
    pub fn idle_longer_than(&self, threshold: Duration) -> Vec<SessionId> {
        let now = self.now_millis();
        let threshold = threshold.as_millis() as u64;
        let map = self.read();

        map.iter()
            .filter(|(_, entry)| {
                now.saturating_sub(entry.last_access.load(Ordering::Relaxed)) >= threshold
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// Remove every entry, returning the pairs in ascending id order.
    /// Shutdown support: the caller disposes each handle.
    pub fn drain(&self) -> Vec<(SessionId, H)> {
        let mut map = self.write();
        std::mem::take(&mut *map)
            .into_iter()
            .map(|(id, entry)| (id, entry.handle))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<SessionId, Entry<H>>> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<SessionId, Entry<H>>> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<H: Clone> Default for SessionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
