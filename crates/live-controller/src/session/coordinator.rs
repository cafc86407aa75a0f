//! `LiveSessionCoordinator` - the single owner of session state.
//!
//! The only component allowed to call the state machine's `transition` and
//! to sequence orchestrator calls with backend persistence. Holds current
//! state internally and re-reads it at the top of every action, so a stale
//! snapshot can never race a transition. Committed transitions are published
//! on a broadcast channel; the orchestrator's listener reacts to those
//! commits, never to requests.
//!
//! Re-entrancy: each of the start-class and end-class operations tracks at
//! most one outstanding marker; a second call while one is outstanding is a
//! silent no-op. Button mashing must not double-invoke device acquisition or
//! double-create session rows.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::errors::{LiveError, MediaErrorCode, UserNotice};
use crate::media::manager::{MediaInitOptions, MediaManager, RetryPolicy};
use crate::media::peer::PeerConnector;
use crate::media::sink::MediaSink;
use crate::orchestrator::{route_media_error, MediaOrchestrator};
use crate::state::{can_end_live, can_go_live, transition, LiveEvent, LiveState, StateCommit};

use super::repository::{SessionClose, SessionId, SessionRepository};
use super::FeedbackSink;

/// Buffer for the committed-transition broadcast.
const COMMIT_CHANNEL_BUFFER: usize = 64;

/// Operation classes tracked for in-flight de-duplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Anything that moves toward an active session.
    Start,
    /// Anything that ends one.
    End,
}

/// Coordinator knobs, from config.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// The creator this controller runs for.
    pub creator_id: String,
    /// How long ICE may take to report a usable path.
    pub ice_timeout: Duration,
    /// Minimum spacing between haptic pulses.
    pub haptic_cooldown: Duration,
    /// Retry policy for full-quality acquisition.
    pub media_retry: RetryPolicy,
}

impl CoordinatorSettings {
    #[must_use]
    pub fn new(creator_id: impl Into<String>) -> Self {
        Self {
            creator_id: creator_id.into(),
            ice_timeout: Duration::from_secs(15),
            haptic_cooldown: Duration::from_secs(5),
            media_retry: RetryPolicy::default(),
        }
    }
}

struct CoordinatorInner {
    state: LiveState,
    session_id: Option<SessionId>,
    session_started_at: Option<DateTime<Utc>>,
    session_started_instant: Option<Instant>,
    calls_taken: u32,
    earnings_cents: u64,
    queue_count: u32,
    last_haptic: Option<Instant>,
    haptics_muted_until: Option<Instant>,
    in_flight: HashSet<OpKind>,
}

impl CoordinatorInner {
    fn clear_session(&mut self) {
        self.session_id = None;
        self.session_started_at = None;
        self.session_started_instant = None;
    }
}

/// Derived, display-ready view of session state.
#[derive(Debug, Clone, Serialize)]
pub struct LiveSnapshot {
    pub state: LiveState,
    pub session_id: Option<SessionId>,
    pub elapsed_seconds: Option<u64>,
    pub calls_taken: u32,
    pub earnings_cents: u64,
    pub queue_count: u32,
}

impl LiveSnapshot {
    /// Elapsed call time as `HH:MM:SS`.
    #[must_use]
    pub fn elapsed_display(&self) -> String {
        let total = self.elapsed_seconds.unwrap_or(0);
        format!(
            "{:02}:{:02}:{:02}",
            total / 3600,
            (total % 3600) / 60,
            total % 60
        )
    }

    /// Accumulated earnings as `$D.CC`.
    #[must_use]
    pub fn earnings_display(&self) -> String {
        format!(
            "${}.{:02}",
            self.earnings_cents / 100,
            self.earnings_cents % 100
        )
    }
}

pub struct LiveSessionCoordinator {
    orchestrator: Arc<MediaOrchestrator>,
    manager: Arc<MediaManager>,
    repository: Arc<dyn SessionRepository>,
    connector: Arc<dyn PeerConnector>,
    feedback: Arc<dyn FeedbackSink>,
    settings: CoordinatorSettings,
    commits: broadcast::Sender<StateCommit>,
    inner: Mutex<CoordinatorInner>,
}

impl LiveSessionCoordinator {
    #[must_use]
    pub fn new(
        orchestrator: Arc<MediaOrchestrator>,
        manager: Arc<MediaManager>,
        repository: Arc<dyn SessionRepository>,
        connector: Arc<dyn PeerConnector>,
        feedback: Arc<dyn FeedbackSink>,
        settings: CoordinatorSettings,
    ) -> Self {
        let (commits, _) = broadcast::channel(COMMIT_CHANNEL_BUFFER);
        Self {
            orchestrator,
            manager,
            repository,
            connector,
            feedback,
            settings,
            commits,
            inner: Mutex::new(CoordinatorInner {
                state: LiveState::Offline,
                session_id: None,
                session_started_at: None,
                session_started_instant: None,
                calls_taken: 0,
                earnings_cents: 0,
                queue_count: 0,
                last_haptic: None,
                haptics_muted_until: None,
                in_flight: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Subscribe to committed transitions.
    #[must_use]
    pub fn subscribe_commits(&self) -> broadcast::Receiver<StateCommit> {
        self.commits.subscribe()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LiveState {
        self.lock().state
    }

    /// Apply `event` to the held state. Returns the commit when the state
    /// actually changed.
    fn apply(inner: &mut CoordinatorInner, event: LiveEvent) -> Option<StateCommit> {
        let next = transition(inner.state, event);
        if next == inner.state {
            debug!(?event, state = ?inner.state, "transition ignored");
            return None;
        }
        let commit = StateCommit {
            from: inner.state,
            to: next,
        };
        inner.state = next;
        Some(commit)
    }

    fn publish(&self, commit: Option<StateCommit>) {
        if let Some(commit) = commit {
            info!(from = ?commit.from, to = ?commit.to, "state committed");
            let _ = self.commits.send(commit);
        }
    }

    /// Become discoverable. Does not touch media.
    ///
    /// Silent no-op unless the creator is offline and no start-class
    /// operation is outstanding.
    #[instrument(skip(self))]
    pub fn go_live(&self) {
        let commit = {
            let mut inner = self.lock();
            if !can_go_live(inner.state) || inner.in_flight.contains(&OpKind::Start) {
                debug!(state = ?inner.state, "go_live ignored");
                return;
            }
            Self::apply(&mut inner, LiveEvent::GoLive)
        };
        self.publish(commit);
    }

    /// Take the next caller: move into prep.
    ///
    /// Does not acquire media itself; the orchestrator's commit listener
    /// acquires the preview after this transition has committed, which is
    /// what keeps hardware acquisition from racing a rejected transition.
    #[instrument(skip(self, preview_sink))]
    pub fn start_next(&self, preview_sink: &MediaSink) {
        let commit = {
            let mut inner = self.lock();
            if inner.state != LiveState::LiveAvailable {
                debug!(state = ?inner.state, "start_next ignored");
                return;
            }
            self.orchestrator.set_preview_sink(preview_sink.clone());
            Self::apply(&mut inner, LiveEvent::EnterPrep)
        };
        self.publish(commit);
    }

    /// Commit to the call: full-quality media, session row, peer
    /// connectivity, then `SessionActive`.
    ///
    /// On any failure the coordinator stops media and rolls back to
    /// `SessionPrep` - not `Offline` - so the creator can retry or pick a
    /// different caller without losing availability.
    #[instrument(skip_all)]
    pub async fn confirm_join(
        &self,
        video_sink: &MediaSink,
        audio_sink: Option<&MediaSink>,
    ) -> Result<(), LiveError> {
        let commit = {
            let mut inner = self.lock();
            if inner.state != LiveState::SessionPrep {
                debug!(state = ?inner.state, "confirm_join ignored");
                return Ok(());
            }
            if !inner.in_flight.insert(OpKind::Start) {
                debug!("join already in flight, ignoring");
                return Ok(());
            }
            Self::apply(&mut inner, LiveEvent::EnterJoining)
        };
        self.publish(commit);

        match self.join_session(video_sink, audio_sink).await {
            Ok(session_id) => {
                let commit = {
                    let mut inner = self.lock();
                    inner.in_flight.remove(&OpKind::Start);
                    inner.calls_taken += 1;
                    Self::apply(&mut inner, LiveEvent::SessionStarted)
                };
                self.publish(commit);
                info!(%session_id, "session active");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "join failed, rolling back to prep");
                self.orchestrator.stop_media("join-failed").await;
                let commit = {
                    let mut inner = self.lock();
                    inner.in_flight.remove(&OpKind::Start);
                    inner.clear_session();
                    Self::apply(&mut inner, LiveEvent::StartFailed)
                };
                self.publish(commit);
                self.report(&err);
                Err(err)
            }
        }
    }

    async fn join_session(
        &self,
        video_sink: &MediaSink,
        audio_sink: Option<&MediaSink>,
    ) -> Result<SessionId, LiveError> {
        let opts = MediaInitOptions::full(
            video_sink.clone(),
            audio_sink.cloned(),
            self.settings.media_retry,
        );
        let stream = self.orchestrator.init_media(opts).await?;

        let started_at = Utc::now();
        let session_id = self
            .repository
            .create_session(&self.settings.creator_id, started_at)
            .await?;
        {
            let mut inner = self.lock();
            inner.session_id = Some(session_id);
            inner.session_started_at = Some(started_at);
            inner.session_started_instant = Some(Instant::now());
        }

        let link = self.connector.connect(&stream).await?;
        self.manager.set_peer_link(link.clone());
        link.wait_connected(self.settings.ice_timeout).await?;
        Ok(session_id)
    }

    /// End the current call and return to availability.
    ///
    /// Media is released before the persistence write, and stays released
    /// whatever the write's outcome: a failed database write must never
    /// leave the camera open. A persistence failure still ends the session
    /// locally and notifies; only a total failure (media still held *and*
    /// write failed) drops the creator to `Offline`.
    #[instrument(skip(self))]
    pub async fn end_live(&self) -> Result<(), LiveError> {
        let (commit, session_id, close) = {
            let mut inner = self.lock();
            if !can_end_live(inner.state) {
                debug!(state = ?inner.state, "end_live ignored");
                return Ok(());
            }
            let Some(session_id) = inner.session_id else {
                debug!("end_live without a session row, ignoring");
                return Ok(());
            };
            if !inner.in_flight.insert(OpKind::End) {
                debug!("end already in flight, ignoring");
                return Ok(());
            }
            let commit = Self::apply(&mut inner, LiveEvent::EndLive);
            let ended_at = Utc::now();
            let duration_seconds = inner
                .session_started_at
                .map_or(0, |started| (ended_at - started).num_seconds());
            let close = SessionClose {
                ended_at,
                calls_taken: inner.calls_taken,
                earnings_cents: inner.earnings_cents,
                duration_seconds,
            };
            (commit, session_id, close)
        };
        self.publish(commit);

        self.orchestrator.stop_media("end-live").await;
        let media_released = !self.manager.has_local_stream();

        let persisted = self.repository.close_session(session_id, close).await;

        let event = if persisted.is_ok() || media_released {
            LiveEvent::SessionEnded
        } else {
            LiveEvent::EndFailed
        };
        let commit = {
            let mut inner = self.lock();
            inner.in_flight.remove(&OpKind::End);
            inner.clear_session();
            Self::apply(&mut inner, event)
        };
        self.publish(commit);

        match persisted {
            Ok(()) => {
                info!(%session_id, "session closed");
                Ok(())
            }
            Err(err) => {
                warn!(%session_id, error = %err, "session close was not persisted");
                self.feedback.notify(UserNotice::warning(
                    "Your call ended, but the session record may not be saved.",
                ));
                Err(LiveError::Repository(err))
            }
        }
    }

    /// App-mount recovery: stop any media and return to `Offline` so a
    /// reload never resumes into a stale session.
    #[instrument(skip(self))]
    pub async fn reset(&self) {
        self.orchestrator.stop_media("reset").await;
        let commit = {
            let mut inner = self.lock();
            inner.clear_session();
            inner.in_flight.clear();
            inner.queue_count = 0;
            Self::apply(&mut inner, LiveEvent::Reset)
        };
        self.publish(commit);
    }

    /// A fan joined the queue: bump the counter and pulse haptics, rate
    /// limited to one pulse per cooldown and suppressible via
    /// [`Self::mute_haptics_until`].
    pub fn handle_queue_join(&self) {
        let fire = {
            let mut inner = self.lock();
            inner.queue_count += 1;
            let now = Instant::now();
            let muted = inner.haptics_muted_until.is_some_and(|until| now < until);
            let cooled = inner
                .last_haptic
                .map_or(true, |last| now.duration_since(last) >= self.settings.haptic_cooldown);
            if !muted && cooled {
                inner.last_haptic = Some(now);
                true
            } else {
                false
            }
        };
        if fire {
            self.feedback.haptic();
        }
    }

    /// A fan left the queue.
    pub fn handle_queue_leave(&self) {
        let mut inner = self.lock();
        inner.queue_count = inner.queue_count.saturating_sub(1);
    }

    /// Suppress haptic pulses until `until`.
    pub fn mute_haptics_until(&self, until: Instant) {
        self.lock().haptics_muted_until = Some(until);
    }

    /// Credit earnings for the running session.
    pub fn record_earnings(&self, cents: u64) {
        let mut inner = self.lock();
        inner.earnings_cents = inner.earnings_cents.saturating_add(cents);
    }

    /// Display-ready view of current session state.
    #[must_use]
    pub fn snapshot(&self) -> LiveSnapshot {
        let inner = self.lock();
        LiveSnapshot {
            state: inner.state,
            session_id: inner.session_id,
            elapsed_seconds: inner
                .session_started_instant
                .map(|started| started.elapsed().as_secs()),
            calls_taken: inner.calls_taken,
            earnings_cents: inner.earnings_cents,
            queue_count: inner.queue_count,
        }
    }

    /// Route an action failure to the feedback surface. Sequencing blocks
    /// stay out of the user's face; everything else gets a classified
    /// notice.
    fn report(&self, err: &LiveError) {
        match err {
            LiveError::Media(media) => {
                if media.code == MediaErrorCode::StateBlock {
                    debug!(error = %media, "state block, not surfacing");
                } else {
                    self.feedback.notify(route_media_error(media));
                }
            }
            LiveError::Peer(_) => self.feedback.notify(UserNotice::error(
                "Could not connect the call. Please try again.",
            )),
            LiveError::Repository(_) => self.feedback.notify(UserNotice::warning(
                "We couldn't reach the server. Your session may not be saved.",
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_display_formats() {
        let snapshot = LiveSnapshot {
            state: LiveState::SessionActive,
            session_id: None,
            elapsed_seconds: Some(3723),
            calls_taken: 0,
            earnings_cents: 0,
            queue_count: 0,
        };
        assert_eq!(snapshot.elapsed_display(), "01:02:03");
    }

    #[test]
    fn test_earnings_display_formats() {
        let snapshot = LiveSnapshot {
            state: LiveState::LiveAvailable,
            session_id: None,
            elapsed_seconds: None,
            calls_taken: 2,
            earnings_cents: 1205,
            queue_count: 0,
        };
        assert_eq!(snapshot.earnings_display(), "$12.05");
        assert_eq!(snapshot.elapsed_display(), "00:00:00");
    }
}
