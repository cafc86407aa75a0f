//! Live Controller dev loop.
//!
//! Runs the full session core against the synthetic capture backend and the
//! in-memory repository: one scripted go-live → call → end cycle with every
//! committed transition logged. Useful for eyeballing orchestration order
//! without a UI shell or real devices.
//!
//! # Startup Flow
//!
//! 1. Initialize tracing
//! 2. Load configuration from environment (creator id defaults for the loop)
//! 3. Wire manager → orchestrator → coordinator with synthetic seams
//! 4. Spawn the lifecycle watch task and the commit listener
//! 5. Run the scripted cycle and print the final snapshot

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_controller::config::Config;
use live_controller::media::{
    AppLifecycleEvent, LifecycleHub, LoopbackConnector, MediaManager, MediaSink, SyntheticCapture,
};
use live_controller::orchestrator::MediaOrchestrator;
use live_controller::session::{
    InMemorySessionRepository, LiveSessionCoordinator, SessionRepository, TracingFeedback,
};

/// How long the loop waits for the lazily acquired preview.
const PREVIEW_WAIT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "live_controller=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Live Controller dev loop");

    // Load configuration; the dev loop supplies a creator id when the
    // environment doesn't.
    let mut vars: HashMap<String, String> = std::env::vars().collect();
    vars.entry("LIVE_CREATOR_ID".to_string())
        .or_insert_with(|| "dev-creator".to_string());
    let config = Config::from_vars(&vars)?;
    info!(creator_id = %config.creator_id, enable_watchdog = config.enable_watchdog, "configuration loaded");

    // Wire the stack with synthetic seams.
    let cancel = CancellationToken::new();
    let lifecycle = LifecycleHub::new();
    let manager = Arc::new(MediaManager::new(
        Arc::new(SyntheticCapture::new()),
        config.manager_settings(),
    ));
    manager.watch_lifecycle(lifecycle.subscribe(), cancel.clone());

    let orchestrator = Arc::new(MediaOrchestrator::new(
        Arc::clone(&manager),
        config.watchdog_settings(),
        config.retry_policy(),
    ));
    let repository = Arc::new(InMemorySessionRepository::new());
    let repository_seam: Arc<dyn SessionRepository> = repository.clone();
    let coordinator = Arc::new(LiveSessionCoordinator::new(
        Arc::clone(&orchestrator),
        Arc::clone(&manager),
        repository_seam,
        Arc::new(LoopbackConnector::new()),
        Arc::new(TracingFeedback),
        config.coordinator_settings(),
    ));
    orchestrator.spawn_commit_listener(coordinator.subscribe_commits(), cancel.clone());

    // App mount: never resume into a stale session.
    coordinator.reset().await;

    // One scripted cycle.
    let preview = MediaSink::video();
    let call_audio = MediaSink::audio();

    coordinator.go_live();
    coordinator.start_next(&preview);
    wait_for_preview(&manager).await;

    coordinator.confirm_join(&preview, Some(&call_audio)).await?;
    coordinator.handle_queue_join();
    coordinator.record_earnings(500);
    tokio::time::sleep(Duration::from_secs(2)).await;

    coordinator.end_live().await?;

    let snapshot = coordinator.snapshot();
    info!(
        elapsed = %snapshot.elapsed_display(),
        earnings = %snapshot.earnings_display(),
        "cycle complete"
    );
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    for record in repository.sessions() {
        println!("{}", serde_json::to_string_pretty(&record)?);
    }

    // App close: the lifecycle safety net releases anything still held.
    lifecycle.publish(AppLifecycleEvent::Unloading);
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    Ok(())
}

async fn wait_for_preview(manager: &MediaManager) {
    let deadline = tokio::time::Instant::now() + PREVIEW_WAIT;
    while !manager.has_local_stream() {
        if tokio::time::Instant::now() >= deadline {
            warn!("preview did not arrive in time, continuing");
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    info!("preview stream attached");
}
