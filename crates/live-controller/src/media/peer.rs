//! Peer connection seam.
//!
//! Offer/answer signaling lives outside this core: a [`PeerConnector`]
//! implementation is handed in and produces a [`PeerLink`] whose ICE
//! connectivity the coordinator observes through a `watch` channel. The
//! media manager tracks at most one link at a time and closes it during
//! teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use super::stream::MediaStream;

/// ICE connectivity of a peer link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl IceConnectionState {
    /// Whether a usable media path exists.
    #[must_use]
    pub fn is_usable(self) -> bool {
        matches!(self, Self::Connected | Self::Completed)
    }
}

/// Peer negotiation failures.
#[derive(Debug, Clone, Error)]
pub enum PeerError {
    #[error("ICE negotiation did not connect within {0:?}")]
    Timeout(Duration),

    #[error("ICE negotiation failed in state {0:?}")]
    Failed(IceConnectionState),

    #[error("signaling channel closed before connectivity was reached")]
    SignalingClosed,
}

/// The active real-time connection, observed by the core.
///
/// Cheap to clone; all clones observe the same connection.
#[derive(Debug, Clone)]
pub struct PeerLink {
    ice: watch::Receiver<IceConnectionState>,
    closed: Arc<AtomicBool>,
}

/// Driver half handed to the signaling layer: publishes ICE state changes
/// into the link.
#[derive(Debug)]
pub struct PeerLinkDriver {
    ice: watch::Sender<IceConnectionState>,
}

impl PeerLink {
    /// Create a driver/link pair starting in [`IceConnectionState::New`].
    #[must_use]
    pub fn channel() -> (PeerLinkDriver, PeerLink) {
        let (tx, rx) = watch::channel(IceConnectionState::New);
        (
            PeerLinkDriver { ice: tx },
            PeerLink {
                ice: rx,
                closed: Arc::new(AtomicBool::new(false)),
            },
        )
    }

    /// Current ICE connectivity.
    #[must_use]
    pub fn ice_state(&self) -> IceConnectionState {
        *self.ice.borrow()
    }

    /// Wait until the link reports a usable media path.
    ///
    /// Resolves once ICE reaches `Connected` or `Completed`; errors on
    /// `Failed`/`Closed`, on a dropped driver (unless the link is already
    /// usable), or when `timeout` elapses first.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), PeerError> {
        let mut ice = self.ice.clone();
        let wait = async move {
            loop {
                let state = *ice.borrow_and_update();
                if state.is_usable() {
                    return Ok(());
                }
                if matches!(
                    state,
                    IceConnectionState::Failed | IceConnectionState::Closed
                ) {
                    return Err(PeerError::Failed(state));
                }
                if ice.changed().await.is_err() {
                    return Err(PeerError::SignalingClosed);
                }
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(PeerError::Timeout(timeout)),
        }
    }

    /// Mark the link closed. Safe to call repeatedly.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl PeerLinkDriver {
    /// Publish a new ICE state. Ignored if every link clone is gone.
    pub fn set_state(&self, state: IceConnectionState) {
        let _ = self.ice.send(state);
    }
}

/// Establishes peer connections. The signaling mechanism (SDP exchange) is
/// entirely the implementor's concern.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Connect a peer carrying `stream` and return the link to observe.
    async fn connect(&self, stream: &MediaStream) -> Result<PeerLink, PeerError>;
}

/// Connector that reports connectivity immediately without any remote end.
///
/// Stands in until real signaling lands; pairs with
/// [`super::capture::SyntheticCapture`] for the dev loop.
#[derive(Debug, Default)]
pub struct LoopbackConnector;

impl LoopbackConnector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PeerConnector for LoopbackConnector {
    async fn connect(&self, _stream: &MediaStream) -> Result<PeerLink, PeerError> {
        let (driver, link) = PeerLink::channel();
        driver.set_state(IceConnectionState::Checking);
        driver.set_state(IceConnectionState::Connected);
        // Dropping the driver is fine: the link reads the latest state
        // before waiting on changes.
        Ok(link)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_connected_resolves_on_connected() {
        let (driver, link) = PeerLink::channel();
        let waiter = tokio::spawn({
            let link = link.clone();
            async move { link.wait_connected(Duration::from_secs(5)).await }
        });
        driver.set_state(IceConnectionState::Checking);
        driver.set_state(IceConnectionState::Connected);
        waiter
            .await
            .expect("task join")
            .expect("should connect");
    }

    #[tokio::test]
    async fn test_wait_connected_errors_on_failure() {
        let (driver, link) = PeerLink::channel();
        driver.set_state(IceConnectionState::Failed);
        let result = link.wait_connected(Duration::from_secs(5)).await;
        assert!(matches!(result, Err(PeerError::Failed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_connected_times_out() {
        let (_driver, link) = PeerLink::channel();
        let result = link.wait_connected(Duration::from_millis(100)).await;
        assert!(matches!(result, Err(PeerError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_loopback_connector_is_immediately_usable() {
        let connector = LoopbackConnector::new();
        let stream = MediaStream::new(Vec::new());
        let link = connector.connect(&stream).await.expect("loopback connect");
        assert!(link.ice_state().is_usable());
        link.wait_connected(Duration::from_secs(1))
            .await
            .expect("already connected");
    }
}
