//! App lifecycle events.
//!
//! The analog of `visibilitychange`/`beforeunload`: the platform shell
//! publishes events into a [`LifecycleHub`], and the media manager's watch
//! task force-stops capture on `Hidden` and `Unloading`. The camera must
//! never stay open in a hidden or closing app, regardless of session state.

use tokio::sync::broadcast;

/// Channel capacity. Lifecycle events are rare; a small buffer is plenty.
const LIFECYCLE_CHANNEL_BUFFER: usize = 16;

/// A platform lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLifecycleEvent {
    /// The app moved to the background / the tab was hidden.
    Hidden,
    /// The app returned to the foreground.
    Visible,
    /// The app is being closed.
    Unloading,
}

/// Broadcast hub for lifecycle events.
#[derive(Debug, Clone)]
pub struct LifecycleHub {
    tx: broadcast::Sender<AppLifecycleEvent>,
}

impl LifecycleHub {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(LIFECYCLE_CHANNEL_BUFFER);
        Self { tx }
    }

    /// Publish an event to every subscriber. Dropped silently when nobody
    /// listens.
    pub fn publish(&self, event: AppLifecycleEvent) {
        let _ = self.tx.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AppLifecycleEvent> {
        self.tx.subscribe()
    }
}

impl Default for LifecycleHub {
    fn default() -> Self {
        Self::new()
    }
}
