//! Scriptable capture backend.
//!
//! Records every acquisition, hands out real `MediaTrack`s (retaining
//! references so tests can count `stop` invocations), and can be scripted
//! to fail, delay, or hang forever.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use live_controller::errors::CaptureError;
use live_controller::media::{CaptureBackend, MediaStream, MediaTrack, StreamConstraints, TrackKind};

#[derive(Default)]
struct State {
    acquisitions: usize,
    fail_queue: VecDeque<CaptureError>,
    hang: bool,
    delay: Option<Duration>,
    tracks: Vec<Arc<MediaTrack>>,
}

/// Mock capture backend for media manager testing.
#[derive(Default)]
pub struct MockCapture {
    inner: Mutex<State>,
}

impl MockCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next acquisition attempt with `err`.
    pub fn fail_next(&self, err: CaptureError) {
        self.inner.lock().unwrap().fail_queue.push_back(err);
    }

    /// Fail the next `n` acquisition attempts with clones of `err`.
    pub fn fail_times(&self, n: usize, err: &CaptureError) {
        let mut state = self.inner.lock().unwrap();
        for _ in 0..n {
            state.fail_queue.push_back(err.clone());
        }
    }

    /// Make every acquisition hang until cancelled from outside (for
    /// watchdog tests).
    pub fn hang_forever(&self) {
        self.inner.lock().unwrap().hang = true;
    }

    /// Undo [`Self::hang_forever`] for subsequent attempts.
    pub fn resume(&self) {
        self.inner.lock().unwrap().hang = false;
    }

    /// Delay each successful acquisition by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().delay = Some(delay);
    }

    /// How many acquisition attempts the backend has seen.
    pub fn acquisitions(&self) -> usize {
        self.inner.lock().unwrap().acquisitions
    }

    /// Every track ever handed out, in order.
    pub fn tracks(&self) -> Vec<Arc<MediaTrack>> {
        self.inner.lock().unwrap().tracks.clone()
    }

    /// Total `stop` invocations across all handed-out tracks.
    pub fn total_stop_calls(&self) -> usize {
        self.tracks().iter().map(|t| t.stop_calls()).sum()
    }
}

#[async_trait]
impl CaptureBackend for MockCapture {
    async fn acquire(&self, constraints: &StreamConstraints) -> Result<MediaStream, CaptureError> {
        let (hang, delay, failure) = {
            let mut state = self.inner.lock().unwrap();
            state.acquisitions += 1;
            (state.hang, state.delay, state.fail_queue.pop_front())
        };

        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = failure {
            return Err(err);
        }

        let mut tracks = Vec::new();
        if constraints.video {
            tracks.push(Arc::new(MediaTrack::new(TrackKind::Video)));
        }
        if constraints.audio {
            tracks.push(Arc::new(MediaTrack::new(TrackKind::Audio)));
        }
        self.inner.lock().unwrap().tracks.extend(tracks.iter().cloned());
        Ok(MediaStream::new(tracks))
    }
}
