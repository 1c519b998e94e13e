//! Session Supervision
//!
//! Explicit process-lifetime state for the allocator + registry pair.
//! Constructed once at startup, cloned into every request handler; all
//! shared state sits behind `Arc`. Replaces the module-level globals the
//! registry would otherwise grow, and owns the teardown path: both the
//! per-session `close` and the whole-process `shutdown`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use registry::{IdAllocator, IdSpace, RegistryError, Result, SessionId, SessionRegistry};
use serde::{Deserialize, Serialize};

use crate::events::{EventBus, SessionEvent};
use crate::sweeper::{DisposeHandle, DropDisposer};

/// Supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Maximum concurrently-live sessions; `None` means unbounded ids
    pub capacity: Option<u64>,

    /// Idle time after which a session is eligible for the expiry sweep
    pub idle_timeout: Duration,

    /// How often the background sweep runs
    pub sweep_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            idle_timeout: Duration::from_secs(15 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Supervisor - composes the id allocator and the session registry
///
/// `H` is the opaque session handle (an `Arc` around the automation
/// session in practice). The supervisor never touches the resource behind
/// it; disposal goes through the configured [`DisposeHandle`].
pub struct Supervisor<H: Send + 'static> {
    allocator: Arc<IdAllocator>,
    registry: Arc<SessionRegistry<H>>,
    disposer: Arc<dyn DisposeHandle<H>>,
    pub event_bus: EventBus,
    config: SupervisorConfig,
}

impl<H: Send + 'static> Clone for Supervisor<H> {
    fn clone(&self) -> Self {
        Self {
            allocator: self.allocator.clone(),
            registry: self.registry.clone(),
            disposer: self.disposer.clone(),
            event_bus: self.event_bus.clone(),
            config: self.config.clone(),
        }
    }
}

impl<H: Clone + Send + Sync + 'static> Supervisor<H> {
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_disposer(config, Arc::new(DropDisposer))
    }

    /// Build a supervisor whose expired and shut-down handles are released
    /// through `disposer` (e.g. closing the underlying browser).
    pub fn with_disposer(config: SupervisorConfig, disposer: Arc<dyn DisposeHandle<H>>) -> Self {
        let space = match config.capacity {
            Some(capacity) => IdSpace::Bounded(capacity),
            None => IdSpace::Unbounded,
        };

        Self {
            allocator: Arc::new(IdAllocator::new(space)),
            registry: Arc::new(SessionRegistry::new()),
            disposer,
            event_bus: EventBus::new(),
            config,
        }
    }

    /// Track a freshly created session handle; the returned id is the sole
    /// means of addressing it from later requests.
    pub fn register(&self, handle: H) -> Result<SessionId> {
        let id = self.allocator.allocate()?;

        if let Err(e) = self.registry.insert(id, handle) {
            // Allocator/registry contract violation; give the id back
            // before surfacing it.
            self.allocator.release(id);
            return Err(e);
        }

        tracing::info!(id, "session registered");
        self.event_bus.publish(SessionEvent::Created { id });
        Ok(id)
    }

    /// Resolve a previously issued id. Unknown or expired ids come back as
    /// `NotFound`, which the request layer maps to a user-facing error.
    pub fn resolve(&self, id: SessionId) -> Result<H> {
        self.registry
            .lookup(id)
            .ok_or(RegistryError::NotFound(id))
    }

    /// Stop tracking a session and return its handle. The caller takes
    /// over disposal of the underlying resource.
    pub fn close(&self, id: SessionId) -> Result<H> {
        let handle = self
            .registry
            .remove(id)
            .ok_or(RegistryError::NotFound(id))?;
        self.allocator.release(id);

        tracing::info!(id, "session closed");
        self.event_bus.publish(SessionEvent::Closed { id });
        Ok(handle)
    }

    /// Live session ids, ascending. Diagnostics and admin listings.
    pub fn list(&self) -> Vec<SessionId> {
        let mut ids = Vec::new();
        self.registry.for_each_ordered(|id, _| ids.push(id));
        ids
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Remove every session idle beyond the configured threshold, dispose
    /// each handle, and publish an `Expired` event per session. Returns
    /// the number reaped.
    pub async fn sweep_once(&self) -> usize {
        let stale = self.registry.idle_longer_than(self.config.idle_timeout);
        let mut reaped = 0;

        for id in stale {
            // The entry may have been closed or resolved between the scan
            // and here; the stamp is re-checked under the write lock so a
            // session back in active use stays live.
            if let Some(handle) = self
                .registry
                .remove_if_idle(id, self.config.idle_timeout)
            {
                self.allocator.release(id);
                tracing::info!(id, "expired idle session");
                self.disposer.dispose(id, handle).await;
                self.event_bus.publish(SessionEvent::Expired { id });
                reaped += 1;
            }
        }

        reaped
    }

    /// Drain the registry and dispose every remaining handle in parallel.
    /// The explicit teardown path: call once at process shutdown.
    pub async fn shutdown(&self) -> usize {
        let drained = self.registry.drain();
        let disposed = drained.len();

        let tasks: Vec<_> = drained
            .into_iter()
            .map(|(id, handle)| {
                self.allocator.release(id);
                let disposer = self.disposer.clone();
                async move {
                    disposer.dispose(id, handle).await;
                }
            })
            .collect();
        join_all(tasks).await;

        tracing::info!(disposed, "supervisor shut down");
        self.event_bus.publish(SessionEvent::ShutdownComplete { disposed });
        disposed
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::assert_ok;

    struct CountingDisposer {
        disposed: AtomicUsize,
    }

    #[async_trait]
    impl<H: Send + 'static> DisposeHandle<H> for CountingDisposer {
        async fn dispose(&self, _id: SessionId, _handle: H) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn quick_sweep_config() -> SupervisorConfig {
        SupervisorConfig {
            capacity: None,
            idle_timeout: Duration::from_millis(15),
            sweep_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn register_resolve_close_roundtrip() {
        let supervisor = Supervisor::new(SupervisorConfig::default());

        let id = tokio_test::assert_ok!(supervisor.register(Arc::new("chrome")));
        assert_eq!(supervisor.resolve(id).unwrap(), Arc::new("chrome"));

        let handle = supervisor.close(id).unwrap();
        assert_eq!(handle, Arc::new("chrome"));
        assert_eq!(supervisor.resolve(id), Err(RegistryError::NotFound(id)));
        assert_eq!(supervisor.close(id), Err(RegistryError::NotFound(id)));
    }

    #[tokio::test]
    async fn close_frees_bounded_capacity() {
        let config = SupervisorConfig {
            capacity: Some(1),
            ..SupervisorConfig::default()
        };
        let supervisor = Supervisor::new(config);

        let id = supervisor.register(Arc::new("only")).unwrap();
        assert!(matches!(
            supervisor.register(Arc::new("extra")),
            Err(RegistryError::CapacityExhausted { capacity: 1 })
        ));

        supervisor.close(id).unwrap();
        supervisor.register(Arc::new("replacement")).unwrap();
    }

    #[tokio::test]
    async fn list_ascends_regardless_of_registration_order() {
        let supervisor = Supervisor::new(SupervisorConfig::default());
        let mut ids: Vec<SessionId> = (0..5)
            .map(|_| supervisor.register(Arc::new("h")).unwrap())
            .collect();
        ids.sort_unstable();

        assert_eq!(supervisor.list(), ids);
    }

    #[tokio::test]
    async fn concurrent_registration_yields_distinct_ids() {
        let supervisor = Supervisor::new(SupervisorConfig::default());

        let tasks: Vec<_> = (0..100)
            .map(|_| {
                let supervisor = supervisor.clone();
                tokio::spawn(async move { supervisor.register(Arc::new("h")).unwrap() })
            })
            .collect();

        let mut ids = std::collections::HashSet::new();
        for task in tasks {
            assert!(ids.insert(task.await.unwrap()), "duplicate id");
        }
        assert_eq!(supervisor.session_count(), 100);
    }

    #[tokio::test]
    async fn shutdown_disposes_everything_once() {
        let disposer = Arc::new(CountingDisposer {
            disposed: AtomicUsize::new(0),
        });
        let supervisor =
            Supervisor::with_disposer(SupervisorConfig::default(), disposer.clone());
        let mut rx = supervisor.event_bus.subscribe();

        for _ in 0..3 {
            supervisor.register(Arc::new("h")).unwrap();
        }

        assert_eq!(supervisor.shutdown().await, 3);
        assert_eq!(disposer.disposed.load(Ordering::SeqCst), 3);
        assert_eq!(supervisor.session_count(), 0);

        // Second shutdown finds nothing left
        assert_eq!(supervisor.shutdown().await, 0);

        // Skip the three Created events, then expect the completion marker
        for _ in 0..3 {
            assert!(matches!(rx.recv().await, Ok(SessionEvent::Created { .. })));
        }
        assert!(matches!(
            rx.recv().await,
            Ok(SessionEvent::ShutdownComplete { disposed: 3 })
        ));
    }

    #[tokio::test]
    async fn sweep_reaps_only_idle_sessions() {
        let disposer = Arc::new(CountingDisposer {
            disposed: AtomicUsize::new(0),
        });
        let supervisor = Supervisor::with_disposer(quick_sweep_config(), disposer.clone());

        let stale = supervisor.register(Arc::new("stale")).unwrap();
        let fresh = supervisor.register(Arc::new("fresh")).unwrap();
        let mut rx = supervisor.event_bus.subscribe();

        tokio::time::sleep(Duration::from_millis(40)).await;
        supervisor.resolve(fresh).unwrap();

        assert_eq!(supervisor.sweep_once().await, 1);
        assert_eq!(disposer.disposed.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.resolve(stale), Err(RegistryError::NotFound(stale)));
        assert_eq!(supervisor.list(), vec![fresh]);

        match rx.recv().await {
            Ok(SessionEvent::Expired { id }) => assert_eq!(id, stale),
            other => panic!("Expected Expired event, got {:?}", other),
        }
    }
}
