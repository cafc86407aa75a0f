//! Caller-owned media attachment points.
//!
//! A `MediaSink` is the analog of a `<video>`/`<audio>` element: the UI
//! creates and owns it, the media manager only attaches and detaches
//! streams. The manager keeps an explicit registry of every sink it has
//! attached to, so teardown detaches exactly those sinks rather than
//! scanning anything global.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::stream::TrackKind;

/// A playback attachment point. Cheap to clone; clones refer to the same
/// underlying sink.
#[derive(Debug, Clone)]
pub struct MediaSink {
    inner: Arc<SinkInner>,
}

#[derive(Debug)]
struct SinkInner {
    id: Uuid,
    kind: TrackKind,
    source: Mutex<Option<Uuid>>,
    playing: AtomicBool,
}

impl MediaSink {
    #[must_use]
    pub fn new(kind: TrackKind) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                id: Uuid::new_v4(),
                kind,
                source: Mutex::new(None),
                playing: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub fn video() -> Self {
        Self::new(TrackKind::Video)
    }

    #[must_use]
    pub fn audio() -> Self {
        Self::new(TrackKind::Audio)
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    #[must_use]
    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    /// Point the sink at a stream and start playback.
    pub(crate) fn set_source(&self, stream_id: Uuid) {
        if let Ok(mut source) = self.inner.source.lock() {
            *source = Some(stream_id);
        }
        self.inner.playing.store(true, Ordering::SeqCst);
    }

    /// Pause playback and clear the media source.
    pub(crate) fn clear(&self) {
        self.inner.playing.store(false, Ordering::SeqCst);
        if let Ok(mut source) = self.inner.source.lock() {
            *source = None;
        }
    }

    /// Id of the stream currently attached, if any.
    #[must_use]
    pub fn source(&self) -> Option<Uuid> {
        self.inner.source.lock().ok().and_then(|source| *source)
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.inner.playing.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_detach() {
        let sink = MediaSink::video();
        assert!(!sink.is_playing());
        assert!(sink.source().is_none());

        let stream_id = Uuid::new_v4();
        sink.set_source(stream_id);
        assert!(sink.is_playing());
        assert_eq!(sink.source(), Some(stream_id));

        sink.clear();
        assert!(!sink.is_playing());
        assert!(sink.source().is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let sink = MediaSink::audio();
        let clone = sink.clone();
        sink.set_source(Uuid::new_v4());
        assert!(clone.is_playing());
        assert_eq!(clone.id(), sink.id());
    }
}
