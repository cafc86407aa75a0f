//! Media primitives and the stream lifecycle manager.
//!
//! Ownership model: the [`MediaManager`] is the exclusive owner of the
//! current local stream and peer link. Consumers borrow through its
//! accessors and must re-query after any lifecycle event may have occurred,
//! because the manager can swap or stop the underlying stream at any time
//! (e.g. on a tab-hide event) without notifying holders of stale references.

pub mod capture;
pub mod lifecycle;
pub mod manager;
pub mod peer;
pub mod sink;
pub mod stream;

pub use capture::{CaptureBackend, SyntheticCapture};
pub use lifecycle::{AppLifecycleEvent, LifecycleHub};
pub use manager::{ManagerSettings, MediaInitOptions, MediaManager, RetryPolicy};
pub use peer::{IceConnectionState, LoopbackConnector, PeerConnector, PeerError, PeerLink, PeerLinkDriver};
pub use sink::MediaSink;
pub use stream::{MediaStream, MediaTrack, StreamConstraints, StreamProfile, TrackKind};
