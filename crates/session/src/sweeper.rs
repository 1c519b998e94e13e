//! Idle-expiry sweep and handle disposal
//!
//! Sessions whose teardown request never arrives would accumulate forever;
//! the sweeper periodically removes entries idle beyond the configured
//! threshold and routes their handles through a [`DisposeHandle`] so the
//! underlying resource (the browser) actually gets closed.

use async_trait::async_trait;
use registry::SessionId;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::supervisor::Supervisor;

/// Releases the resource behind a handle once the registry no longer
/// tracks it. Implemented by whatever created the sessions; the registry
/// side never interprets the handle itself.
#[async_trait]
pub trait DisposeHandle<H: Send + 'static>: Send + Sync {
    async fn dispose(&self, id: SessionId, handle: H);
}

/// Disposer that just drops the handle. The default when the handle's own
/// `Drop` already releases the resource.
pub struct DropDisposer;

#[async_trait]
impl<H: Send + 'static> DisposeHandle<H> for DropDisposer {
    async fn dispose(&self, _id: SessionId, _handle: H) {}
}

/// Spawn the periodic expiry sweep for `supervisor`. Runs until the
/// returned handle is aborted or the runtime shuts down.
pub fn spawn_sweeper<H: Clone + Send + Sync + 'static>(
    supervisor: Supervisor<H>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(supervisor.config().sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately; skip it so a fresh process
        // does not sweep before anything has had a chance to go idle.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let reaped = supervisor.sweep_once().await;
            if reaped > 0 {
                tracing::debug!(reaped, "expiry sweep removed idle sessions");
            }
        }
    })
}
