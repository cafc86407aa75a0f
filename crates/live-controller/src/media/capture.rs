//! Platform capture seam.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::CaptureError;

use super::stream::{MediaStream, MediaTrack, StreamConstraints, TrackKind};

/// The platform capture API. Implementations open real devices; the core
/// never calls one directly, only through the media manager.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Acquire a stream satisfying `constraints`.
    ///
    /// Failures are raw platform-shaped [`CaptureError`]s; the media manager
    /// normalizes them before they reach anyone else.
    async fn acquire(&self, constraints: &StreamConstraints) -> Result<MediaStream, CaptureError>;
}

/// A capture backend that fabricates tracks without touching hardware.
///
/// Used by the dev-loop binary and anywhere a headless source is enough.
#[derive(Debug, Default)]
pub struct SyntheticCapture;

impl SyntheticCapture {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CaptureBackend for SyntheticCapture {
    async fn acquire(&self, constraints: &StreamConstraints) -> Result<MediaStream, CaptureError> {
        let mut tracks = Vec::new();
        if constraints.video {
            tracks.push(Arc::new(MediaTrack::new(TrackKind::Video)));
        }
        if constraints.audio {
            tracks.push(Arc::new(MediaTrack::new(TrackKind::Audio)));
        }
        if tracks.is_empty() {
            return Err(CaptureError::Overconstrained(
                "neither video nor audio requested".to_string(),
            ));
        }
        let stream = MediaStream::new(tracks);
        debug!(stream_id = %stream.id(), profile = ?constraints.profile, "synthetic stream acquired");
        Ok(stream)
    }
}
