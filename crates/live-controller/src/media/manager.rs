//! `MediaManager` - exclusive owner of the local capture stream.
//!
//! Responsibilities:
//!
//! - Acquire camera/microphone through the [`CaptureBackend`] with linear
//!   backoff retry, normalizing raw failures at this boundary
//! - Coalesce concurrent `start` calls onto one acquisition (device prompts
//!   must not stack)
//! - Reattach an already-live stream instead of re-acquiring (no visible
//!   restart on repeated calls)
//! - Serialize `start` against `stop` with bounded handoff waits so a stream
//!   is never torn down mid-acquisition
//! - Tear down idempotently: peer link, remote tracks, local tracks, every
//!   registered sink, in that order
//! - Force-stop on app lifecycle events (tab hidden, app closing)

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::MediaError;
use crate::state::LiveState;

use super::capture::CaptureBackend;
use super::lifecycle::AppLifecycleEvent;
use super::peer::PeerLink;
use super::sink::MediaSink;
use super::stream::{MediaStream, StreamConstraints};

/// Default bounded wait for the opposite operation to finish.
pub const DEFAULT_HANDOFF_WAIT: Duration = Duration::from_millis(1500);

/// Default poll interval while waiting.
pub const DEFAULT_HANDOFF_POLL: Duration = Duration::from_millis(50);

/// Retry policy for one acquisition call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts (minimum 1).
    pub attempts: u32,
    /// Base backoff; the wait after attempt N is `backoff * N`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(300),
        }
    }
}

/// Options for one acquisition call. Constructed per call, discarded after.
#[derive(Debug, Clone)]
pub struct MediaInitOptions {
    /// Where to attach the video track, if anywhere. Owned by the caller.
    pub video_sink: Option<MediaSink>,
    /// Where to attach the audio track, if anywhere. Owned by the caller.
    pub audio_sink: Option<MediaSink>,
    pub constraints: StreamConstraints,
    /// Which lifecycle phase this acquisition is for.
    pub target_state: LiveState,
    /// Local-only preview, no call committed yet.
    pub preview_only: bool,
    pub retry: RetryPolicy,
}

impl MediaInitOptions {
    /// Preview acquisition into a single video sink.
    #[must_use]
    pub fn preview(video_sink: Option<MediaSink>, retry: RetryPolicy) -> Self {
        Self {
            video_sink,
            audio_sink: None,
            constraints: StreamConstraints::preview(),
            target_state: LiveState::SessionPrep,
            preview_only: true,
            retry,
        }
    }

    /// Full-quality acquisition for a call join.
    #[must_use]
    pub fn full(video_sink: MediaSink, audio_sink: Option<MediaSink>, retry: RetryPolicy) -> Self {
        Self {
            video_sink: Some(video_sink),
            audio_sink,
            constraints: StreamConstraints::full(),
            target_state: LiveState::SessionJoining,
            preview_only: false,
            retry,
        }
    }
}

/// Handoff timing knobs, from config.
#[derive(Debug, Clone, Copy)]
pub struct ManagerSettings {
    pub handoff_wait: Duration,
    pub handoff_poll: Duration,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            handoff_wait: DEFAULT_HANDOFF_WAIT,
            handoff_poll: DEFAULT_HANDOFF_POLL,
        }
    }
}

type AcquireResult = Result<MediaStream, MediaError>;

/// How a `start` call proceeds after inspecting shared state.
enum StartPath {
    /// An acquisition is already in flight; await its result.
    Join(watch::Receiver<Option<AcquireResult>>),
    /// A live stream exists; it was reattached to the new sinks.
    Reuse(MediaStream),
    /// This call owns the acquisition and settles the channel.
    Acquire(watch::Sender<Option<AcquireResult>>),
}

/// Clears the owner-side acquisition markers if the owning `start` future
/// is dropped mid-acquisition (the watchdog cancels it by dropping). Without
/// this, `starting`/`in_flight` stay set forever: later starts join a dead
/// channel and later stops burn the full handoff wait.
struct StartCleanup<'a> {
    manager: &'a MediaManager,
    armed: bool,
}

impl Drop for StartCleanup<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("owning start was dropped mid-acquisition, clearing markers");
            let mut inner = self.manager.lock();
            inner.starting = false;
            inner.in_flight = None;
        }
    }
}

#[derive(Default)]
struct Inner {
    local: Option<MediaStream>,
    remote: Option<MediaStream>,
    peer: Option<PeerLink>,
    /// Every sink a stream has been attached to since the last stop.
    attached: Vec<MediaSink>,
    starting: bool,
    stopping: bool,
    in_flight: Option<watch::Receiver<Option<AcquireResult>>>,
}

/// Exclusive owner of the local stream, remote stream and peer link.
///
/// Construct once at application startup and share by `Arc`. Consumers
/// borrow stream references through the accessors and must re-query after
/// any lifecycle event may have occurred.
pub struct MediaManager {
    backend: Arc<dyn CaptureBackend>,
    settings: ManagerSettings,
    inner: Mutex<Inner>,
}

impl MediaManager {
    #[must_use]
    pub fn new(backend: Arc<dyn CaptureBackend>, settings: ManagerSettings) -> Self {
        Self {
            backend,
            settings,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Acquire (or reuse) the local stream and attach it to the given sinks.
    ///
    /// Idempotent and coalescing:
    /// - an acquisition already in flight is joined, not duplicated;
    /// - an already-live stream is reattached to the newly supplied sinks
    ///   instead of re-acquired;
    /// - otherwise the backend is called with up to `opts.retry.attempts`
    ///   attempts and linear backoff, and the final failure is normalized.
    ///
    /// Waits (bounded) for a concurrent `stop` to finish first.
    pub async fn start(&self, opts: MediaInitOptions) -> AcquireResult {
        self.wait_while(|inner| inner.stopping, "stop").await;

        let path = {
            let mut inner = self.lock();
            if let Some(rx) = inner.in_flight.clone() {
                StartPath::Join(rx)
            } else if let Some(stream) = inner.local.clone().filter(MediaStream::is_active) {
                Self::attach(&mut inner, &stream, &opts);
                StartPath::Reuse(stream)
            } else {
                inner.local = None;
                inner.starting = true;
                let (tx, rx) = watch::channel(None);
                inner.in_flight = Some(rx);
                StartPath::Acquire(tx)
            }
        };

        match path {
            StartPath::Join(mut rx) => {
                debug!("joining in-flight media acquisition");
                loop {
                    let settled = rx.borrow_and_update().clone();
                    if let Some(result) = settled {
                        return result;
                    }
                    if rx.changed().await.is_err() {
                        return Err(MediaError::hardware("media acquisition was abandoned"));
                    }
                }
            }
            StartPath::Reuse(stream) => {
                debug!(stream_id = %stream.id(), "reusing live stream, reattached to new sinks");
                Ok(stream)
            }
            StartPath::Acquire(tx) => {
                let mut cleanup = StartCleanup {
                    manager: self,
                    armed: true,
                };
                let result = self.acquire_with_retry(&opts).await;
                {
                    let mut inner = self.lock();
                    inner.starting = false;
                    inner.in_flight = None;
                    if let Ok(stream) = &result {
                        inner.local = Some(stream.clone());
                        Self::attach(&mut inner, stream, &opts);
                    }
                }
                cleanup.armed = false;
                let _ = tx.send(Some(result.clone()));
                result
            }
        }
    }

    async fn acquire_with_retry(&self, opts: &MediaInitOptions) -> AcquireResult {
        let attempts = opts.retry.attempts.max(1);
        let mut last = None;
        for attempt in 1..=attempts {
            match self.backend.acquire(&opts.constraints).await {
                Ok(stream) => {
                    info!(
                        stream_id = %stream.id(),
                        attempt,
                        preview_only = opts.preview_only,
                        "media stream acquired"
                    );
                    return Ok(stream);
                }
                Err(err) => {
                    warn!(attempt, attempts, error = %err, "media acquisition attempt failed");
                    last = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(opts.retry.backoff * attempt).await;
                    }
                }
            }
        }
        Err(last.as_ref().map_or_else(
            || MediaError::hardware("media acquisition failed with no attempts"),
            MediaError::from_capture,
        ))
    }

    /// Tear everything down. Idempotent: a second call while one is in
    /// progress, or after a completed stop, does no further work.
    ///
    /// Waits (bounded) for a concurrent `start` to settle first, then
    /// releases in order: peer link, remote tracks, local tracks, every
    /// registered sink.
    pub async fn stop(&self, reason: &str) {
        {
            let mut inner = self.lock();
            if inner.stopping {
                debug!(reason, "stop already in progress, ignoring");
                return;
            }
            inner.stopping = true;
        }

        self.wait_while(|inner| inner.starting || inner.in_flight.is_some(), "start")
            .await;

        let (peer, remote, local, attached) = {
            let mut inner = self.lock();
            (
                inner.peer.take(),
                inner.remote.take(),
                inner.local.take(),
                std::mem::take(&mut inner.attached),
            )
        };

        if let Some(peer) = peer {
            peer.close();
        }
        if let Some(remote) = remote {
            remote.stop_tracks();
        }
        if let Some(local) = local {
            local.stop_tracks();
        }
        for sink in &attached {
            sink.clear();
        }

        self.lock().stopping = false;
        info!(reason, sinks_detached = attached.len(), "media torn down");
    }

    /// Attach a remote (peer) stream. Its lifecycle is independent of the
    /// local preview but it is fully torn down by `stop`.
    pub fn attach_remote(
        &self,
        stream: MediaStream,
        video_sink: Option<&MediaSink>,
        audio_sink: Option<&MediaSink>,
    ) {
        let mut inner = self.lock();
        for sink in [video_sink, audio_sink].into_iter().flatten() {
            sink.set_source(stream.id());
            Self::register(&mut inner, sink);
        }
        inner.remote = Some(stream);
    }

    /// Register the active peer link so `stop` can release it. At most one
    /// link is tracked; a newer one replaces (and closes) the old.
    pub fn set_peer_link(&self, link: PeerLink) {
        let previous = {
            let mut inner = self.lock();
            inner.peer.replace(link)
        };
        if let Some(previous) = previous {
            previous.close();
        }
    }

    /// Whether a live local stream is currently held.
    #[must_use]
    pub fn has_local_stream(&self) -> bool {
        self.lock().local.as_ref().is_some_and(MediaStream::is_active)
    }

    /// Borrow the current local stream. Do not cache across lifecycle
    /// events; re-query instead.
    #[must_use]
    pub fn local_stream(&self) -> Option<MediaStream> {
        self.lock().local.clone()
    }

    /// Spawn the lifecycle safety net: stops media unconditionally when the
    /// app is hidden or closing.
    pub fn watch_lifecycle(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<AppLifecycleEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(AppLifecycleEvent::Hidden) => manager.stop("app-hidden").await,
                        Ok(AppLifecycleEvent::Unloading) => manager.stop("app-unloading").await,
                        Ok(AppLifecycleEvent::Visible) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "lifecycle events lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        })
    }

    fn attach(inner: &mut Inner, stream: &MediaStream, opts: &MediaInitOptions) {
        for sink in [opts.video_sink.as_ref(), opts.audio_sink.as_ref()]
            .into_iter()
            .flatten()
        {
            sink.set_source(stream.id());
            Self::register(inner, sink);
        }
    }

    fn register(inner: &mut Inner, sink: &MediaSink) {
        if !inner.attached.iter().any(|s| s.id() == sink.id()) {
            inner.attached.push(sink.clone());
        }
    }

    /// Poll until `cond` clears or the bounded handoff wait expires. On
    /// expiry the caller proceeds anyway; a wedged opposite operation must
    /// not freeze the UI forever.
    async fn wait_while<F>(&self, cond: F, waiting_on: &str)
    where
        F: Fn(&Inner) -> bool,
    {
        if !cond(&self.lock()) {
            return;
        }
        let deadline = Instant::now() + self.settings.handoff_wait;
        loop {
            tokio::time::sleep(self.settings.handoff_poll).await;
            if !cond(&self.lock()) {
                return;
            }
            if Instant::now() >= deadline {
                warn!(waiting_on, "handoff wait expired, proceeding");
                return;
            }
        }
    }
}
