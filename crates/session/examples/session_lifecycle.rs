//! Session lifecycle example - registering, resolving and expiring sessions
//!
//! Stands in for the HTTP layer: each "request" below supplies only the
//! numeric id, exactly as an API client would after the create response.

use std::sync::Arc;
use std::time::Duration;

use session::{spawn_sweeper, Supervisor, SupervisorConfig};

/// Stand-in for an automation-session object. A real caller would store an
/// `Arc` around its browser/driver handle instead.
#[derive(Debug)]
struct FakeBrowser {
    url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = SupervisorConfig {
        capacity: Some(20),
        idle_timeout: Duration::from_millis(500),
        sweep_interval: Duration::from_millis(100),
    };
    let supervisor: Supervisor<Arc<FakeBrowser>> = Supervisor::new(config);

    // Subscribe to lifecycle events before anything happens
    let mut event_rx = supervisor.event_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            println!("📢 Event: {:?}", event);
        }
    });

    // Session creation: allocate an id, insert the handle, return the id
    let id = supervisor.register(Arc::new(FakeBrowser {
        url: "https://portal.example.edu/login".into(),
    }))?;
    println!("✅ Created session, API response: {}", serde_json::json!({ "id": id }));

    // Later request: the client supplies only the id
    let browser = supervisor.resolve(id)?;
    println!("🔎 Resolved session {} at {}", id, browser.url);

    // Unknown id: a normal, user-facing error, not a crash
    match supervisor.resolve(9999) {
        Err(e) => println!("🚫 Resolving a bogus id fails cleanly: {}", e),
        Ok(_) => unreachable!(),
    }

    // Leave a second session idle and let the sweep reap it
    let idle_id = supervisor.register(Arc::new(FakeBrowser {
        url: "https://portal.example.edu/grades".into(),
    }))?;
    let sweeper = spawn_sweeper(supervisor.clone());

    // Keep the first session warm while the second goes stale
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(200)).await;
        supervisor.resolve(id)?;
    }
    assert!(supervisor.resolve(idle_id).is_err());
    println!("🧹 Idle session {} was expired by the sweep", idle_id);

    // Explicit teardown of the survivor
    let handle = supervisor.close(id)?;
    println!("👋 Closed session {} ({})", id, handle.url);

    // Process shutdown: dispose anything left
    let disposed = supervisor.shutdown().await;
    println!("🛑 Shutdown disposed {} remaining sessions", disposed);
    sweeper.abort();

    Ok(())
}
