//! Session-level coordination: the live-session coordinator, the backend
//! persistence seam, and the UI feedback seam.

pub mod coordinator;
pub mod repository;

use tracing::{debug, error, info, warn};

use crate::errors::{NoticeSeverity, UserNotice};

pub use coordinator::{CoordinatorSettings, LiveSessionCoordinator, LiveSnapshot, OpKind};
pub use repository::{
    InMemorySessionRepository, SessionClose, SessionId, SessionRecord, SessionRepository,
};

/// UI feedback surface: user notices and haptic pulses.
///
/// The core classifies and throttles; rendering and vibration are the
/// shell's concern.
pub trait FeedbackSink: Send + Sync {
    fn notify(&self, notice: UserNotice);
    fn haptic(&self);
}

/// Feedback sink that only logs. The default until a UI shell is wired.
#[derive(Debug, Default)]
pub struct TracingFeedback;

impl FeedbackSink for TracingFeedback {
    fn notify(&self, notice: UserNotice) {
        match notice.severity {
            NoticeSeverity::Info => info!(message = %notice.message, "user notice"),
            NoticeSeverity::Warning => warn!(message = %notice.message, "user notice"),
            NoticeSeverity::Error => error!(message = %notice.message, "user notice"),
        }
    }

    fn haptic(&self) {
        debug!("haptic pulse");
    }
}
