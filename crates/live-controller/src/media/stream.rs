//! Local media stream and track primitives.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of media a track or sink carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Quality tier requested from the capture backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamProfile {
    /// Creator-only preview before committing to a call.
    Preview,
    /// Full call quality.
    Full,
}

/// Track constraints for an acquisition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub video: bool,
    pub audio: bool,
    pub profile: StreamProfile,
}

impl StreamConstraints {
    /// Video-only preview, low quality tier.
    #[must_use]
    pub fn preview() -> Self {
        Self {
            video: true,
            audio: false,
            profile: StreamProfile::Preview,
        }
    }

    /// Full call quality, video and audio.
    #[must_use]
    pub fn full() -> Self {
        Self {
            video: true,
            audio: true,
            profile: StreamProfile::Full,
        }
    }
}

/// A single capture track. Stopping is idempotent; the invocation counter
/// exists so teardown paths can be audited.
#[derive(Debug)]
pub struct MediaTrack {
    id: Uuid,
    kind: TrackKind,
    stopped: AtomicBool,
    stop_calls: AtomicUsize,
}

impl MediaTrack {
    #[must_use]
    pub fn new(kind: TrackKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            stopped: AtomicBool::new(false),
            stop_calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Stop the track. Returns `true` only for the call that actually
    /// stopped it.
    pub fn stop(&self) -> bool {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        !self.stopped.swap(true, Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// How many times `stop` has been invoked on this track.
    #[must_use]
    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

/// A set of tracks acquired together. Clones share the same underlying
/// tracks, so stopping through any clone stops them all.
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: Uuid,
    tracks: Vec<Arc<MediaTrack>>,
}

impl MediaStream {
    #[must_use]
    pub fn new(tracks: Vec<Arc<MediaTrack>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tracks,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn tracks(&self) -> &[Arc<MediaTrack>] {
        &self.tracks
    }

    /// Stop every track on the stream.
    pub fn stop_tracks(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    /// Whether any track is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(|t| !t.is_stopped())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_track_stop_is_idempotent() {
        let track = MediaTrack::new(TrackKind::Video);
        assert!(!track.is_stopped());
        assert!(track.stop());
        assert!(!track.stop());
        assert!(track.is_stopped());
        assert_eq!(track.stop_calls(), 2);
    }

    #[test]
    fn test_stream_clones_share_tracks() {
        let stream = MediaStream::new(vec![
            Arc::new(MediaTrack::new(TrackKind::Video)),
            Arc::new(MediaTrack::new(TrackKind::Audio)),
        ]);
        let clone = stream.clone();
        assert!(clone.is_active());

        stream.stop_tracks();
        assert!(!clone.is_active());
        assert_eq!(clone.id(), stream.id());
    }
}
