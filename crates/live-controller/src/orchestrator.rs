//! `MediaOrchestrator` - glue between committed lifecycle state and the
//! media manager.
//!
//! Three jobs:
//!
//! - Gate media initialization to the two legitimate target states and wrap
//!   acquisition in an optional watchdog timeout
//! - Subscribe once to the coordinator's *committed* transitions and lazily
//!   acquire the preview when prep is entered (hardware always follows a
//!   committed transition, never a requested one)
//! - Classify normalized media errors into user-facing notices

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{MediaError, MediaErrorCode, UserNotice};
use crate::media::manager::{MediaInitOptions, MediaManager, RetryPolicy};
use crate::media::sink::MediaSink;
use crate::media::stream::MediaStream;
use crate::state::{can_init_media, LiveState, StateCommit};

/// Watchdog knobs, from config (`LIVE_ENABLE_WATCHDOG` / `LIVE_WATCHDOG_MS`).
#[derive(Debug, Clone, Copy)]
pub struct WatchdogSettings {
    pub enabled: bool,
    pub timeout: std::time::Duration,
}

pub struct MediaOrchestrator {
    manager: Arc<MediaManager>,
    watchdog: WatchdogSettings,
    preview_retry: RetryPolicy,
    /// Attachment point for lazily acquired previews, registered by the
    /// coordinator before it transitions into prep.
    preview_sink: Mutex<Option<MediaSink>>,
    /// Subscribe-once guard. Held on the instance, not module state, so
    /// tests can construct fresh orchestrators freely.
    subscribed: AtomicBool,
}

impl MediaOrchestrator {
    #[must_use]
    pub fn new(
        manager: Arc<MediaManager>,
        watchdog: WatchdogSettings,
        preview_retry: RetryPolicy,
    ) -> Self {
        Self {
            manager,
            watchdog,
            preview_retry,
            preview_sink: Mutex::new(None),
            subscribed: AtomicBool::new(false),
        }
    }

    /// Register the sink future previews attach to.
    pub fn set_preview_sink(&self, sink: MediaSink) {
        if let Ok(mut preview) = self.preview_sink.lock() {
            *preview = Some(sink);
        }
    }

    /// Initialize media for a lifecycle phase.
    ///
    /// Only `SessionPrep` and `SessionJoining` are legal targets; any other
    /// target is rejected with a `StateBlock` error before any hardware is
    /// touched. When the watchdog is enabled and acquisition does not settle
    /// within its window, the manager is force-stopped and a
    /// `HardwareError` raised.
    ///
    /// Caller obligation: invoke this only from a user-gesture-initiated
    /// call path; some platforms refuse capture requests outside one.
    pub async fn init_media(&self, opts: MediaInitOptions) -> Result<MediaStream, MediaError> {
        if !can_init_media(opts.target_state) {
            return Err(MediaError::state_block(format!(
                "media init is not allowed for target state {:?}",
                opts.target_state
            )));
        }

        if self.watchdog.enabled {
            match tokio::time::timeout(self.watchdog.timeout, self.manager.start(opts)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout = ?self.watchdog.timeout, "media acquisition watchdog expired");
                    self.manager.stop("watchdog-timeout").await;
                    Err(MediaError::hardware(
                        "camera/microphone did not respond in time",
                    ))
                }
            }
        } else {
            self.manager.start(opts).await
        }
    }

    /// Thin pass-through to the manager's stop.
    pub async fn stop_media(&self, reason: &str) {
        self.manager.stop(reason).await;
    }

    /// Wire the committed-transition listener. Idempotent: only the first
    /// call on an instance spawns a task, later calls return `None`.
    pub fn spawn_commit_listener(
        self: &Arc<Self>,
        mut commits: broadcast::Receiver<StateCommit>,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            debug!("commit listener already wired, ignoring");
            return None;
        }
        let orchestrator = Arc::clone(self);
        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    commit = commits.recv() => match commit {
                        Ok(commit) => orchestrator.handle_commit(commit).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "state commits lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        }))
    }

    async fn handle_commit(&self, commit: StateCommit) {
        // Entering prep from anywhere else: lazily acquire the preview,
        // exactly once per entry, and only if no stream is already held.
        if commit.to == LiveState::SessionPrep
            && commit.from != LiveState::SessionPrep
            && !self.manager.has_local_stream()
        {
            let sink = self
                .preview_sink
                .lock()
                .ok()
                .and_then(|preview| preview.clone());
            let opts = MediaInitOptions::preview(sink, self.preview_retry);
            match self.init_media(opts).await {
                Ok(stream) => {
                    info!(stream_id = %stream.id(), "preview acquired after prep commit");
                }
                Err(err) => warn!(error = %err, "lazy preview acquisition failed"),
            }
        }

        if commit.to == LiveState::Teardown {
            self.stop_media("state-teardown").await;
        }
    }
}

/// Map a normalized media error to a user-facing notice.
///
/// Sequencing blocks are informational ("we're not ready yet"), permission
/// problems are actionable warnings, device/hardware problems are errors.
/// Callers must not conflate the three.
#[must_use]
pub fn route_media_error(err: &MediaError) -> UserNotice {
    match err.code {
        MediaErrorCode::StateBlock => UserNotice::info("Hold on, we're still getting things ready."),
        MediaErrorCode::PermissionDenied => UserNotice::warning(
            "Camera and microphone access is blocked. Enable permissions in your browser settings.",
        ),
        MediaErrorCode::DeviceNotFound => {
            UserNotice::error("No camera or microphone was found on this device.")
        }
        MediaErrorCode::HardwareError => UserNotice::error(
            "Your camera or microphone is unavailable. Close other apps that may be using it.",
        ),
        MediaErrorCode::BrowserPolicy => {
            UserNotice::warning("Playback was blocked by the browser. Tap the screen to resume.")
        }
        MediaErrorCode::Unknown => {
            UserNotice::error("Something went wrong starting your camera. Please try again.")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::errors::NoticeSeverity;

    #[test]
    fn test_error_routing_severities() {
        let cases = [
            (MediaErrorCode::StateBlock, NoticeSeverity::Info),
            (MediaErrorCode::PermissionDenied, NoticeSeverity::Warning),
            (MediaErrorCode::DeviceNotFound, NoticeSeverity::Error),
            (MediaErrorCode::HardwareError, NoticeSeverity::Error),
            (MediaErrorCode::BrowserPolicy, NoticeSeverity::Warning),
            (MediaErrorCode::Unknown, NoticeSeverity::Error),
        ];
        for (code, severity) in cases {
            let notice = route_media_error(&MediaError::new(code, "x"));
            assert_eq!(notice.severity, severity, "wrong severity for {code:?}");
            assert!(!notice.message.is_empty());
        }
    }
}
