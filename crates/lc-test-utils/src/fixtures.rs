//! `TestRig` - the full session core wired with mocks.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use live_controller::media::{
    CaptureBackend, LifecycleHub, ManagerSettings, MediaManager, PeerConnector, RetryPolicy,
};
use live_controller::orchestrator::{MediaOrchestrator, WatchdogSettings};
use live_controller::session::{
    CoordinatorSettings, FeedbackSink, LiveSessionCoordinator, SessionRepository,
};

use crate::feedback::CollectingFeedback;
use crate::mock_capture::MockCapture;
use crate::mock_peer::ScriptedConnector;
use crate::mock_repository::RecordingRepository;

/// Builder for a [`TestRig`]. Defaults: watchdog disabled, short ICE
/// timeout, default handoff timings, creator `creator-1`.
pub struct TestRigBuilder {
    watchdog: WatchdogSettings,
    manager: ManagerSettings,
    coordinator: CoordinatorSettings,
}

impl TestRigBuilder {
    pub fn new() -> Self {
        let mut coordinator = CoordinatorSettings::new("creator-1");
        coordinator.ice_timeout = Duration::from_secs(1);
        Self {
            watchdog: WatchdogSettings {
                enabled: false,
                timeout: Duration::from_secs(8),
            },
            manager: ManagerSettings::default(),
            coordinator,
        }
    }

    #[must_use]
    pub fn watchdog(mut self, timeout: Duration) -> Self {
        self.watchdog = WatchdogSettings {
            enabled: true,
            timeout,
        };
        self
    }

    #[must_use]
    pub fn retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.coordinator.media_retry = RetryPolicy { attempts, backoff };
        self
    }

    #[must_use]
    pub fn ice_timeout(mut self, timeout: Duration) -> Self {
        self.coordinator.ice_timeout = timeout;
        self
    }

    #[must_use]
    pub fn haptic_cooldown(mut self, cooldown: Duration) -> Self {
        self.coordinator.haptic_cooldown = cooldown;
        self
    }

    pub fn build(self) -> TestRig {
        let capture = Arc::new(MockCapture::new());
        let repository = Arc::new(RecordingRepository::new());
        let connector = Arc::new(ScriptedConnector::connecting());
        let feedback = Arc::new(CollectingFeedback::new());

        // Coerce the concrete mocks to the trait objects the core takes.
        let backend: Arc<dyn CaptureBackend> = capture.clone();
        let repository_seam: Arc<dyn SessionRepository> = repository.clone();
        let connector_seam: Arc<dyn PeerConnector> = connector.clone();
        let feedback_seam: Arc<dyn FeedbackSink> = feedback.clone();

        let manager = Arc::new(MediaManager::new(backend, self.manager));
        let orchestrator = Arc::new(MediaOrchestrator::new(
            Arc::clone(&manager),
            self.watchdog,
            self.coordinator.media_retry,
        ));
        let coordinator = Arc::new(LiveSessionCoordinator::new(
            Arc::clone(&orchestrator),
            Arc::clone(&manager),
            repository_seam,
            connector_seam,
            feedback_seam,
            self.coordinator,
        ));
        TestRig {
            capture,
            manager,
            orchestrator,
            repository,
            connector,
            feedback,
            coordinator,
            lifecycle: LifecycleHub::new(),
            cancel: CancellationToken::new(),
        }
    }
}

impl Default for TestRigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The full stack with every seam mocked.
pub struct TestRig {
    pub capture: Arc<MockCapture>,
    pub manager: Arc<MediaManager>,
    pub orchestrator: Arc<MediaOrchestrator>,
    pub repository: Arc<RecordingRepository>,
    pub connector: Arc<ScriptedConnector>,
    pub feedback: Arc<CollectingFeedback>,
    pub coordinator: Arc<LiveSessionCoordinator>,
    pub lifecycle: LifecycleHub,
    pub cancel: CancellationToken,
}

impl TestRig {
    pub fn new() -> Self {
        TestRigBuilder::new().build()
    }

    pub fn builder() -> TestRigBuilder {
        TestRigBuilder::new()
    }

    /// Wire the orchestrator's commit listener (preview-on-prep,
    /// stop-on-teardown). Tests that assert on rollback without lazy
    /// re-acquisition simply don't call this.
    pub fn wire_listener(&self) {
        self.orchestrator
            .spawn_commit_listener(self.coordinator.subscribe_commits(), self.cancel.clone());
    }

    /// Wire the manager's lifecycle safety net.
    pub fn wire_lifecycle(&self) {
        self.manager
            .watch_lifecycle(self.lifecycle.subscribe(), self.cancel.clone());
    }
}

impl Default for TestRig {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestRig {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
