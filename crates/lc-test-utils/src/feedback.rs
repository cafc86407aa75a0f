//! Collecting feedback sink.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use live_controller::errors::{NoticeSeverity, UserNotice};
use live_controller::session::FeedbackSink;

/// Feedback sink that records everything for assertions.
#[derive(Default)]
pub struct CollectingFeedback {
    notices: Mutex<Vec<UserNotice>>,
    haptics: AtomicUsize,
}

impl CollectingFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<UserNotice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn notices_with_severity(&self, severity: NoticeSeverity) -> Vec<UserNotice> {
        self.notices()
            .into_iter()
            .filter(|n| n.severity == severity)
            .collect()
    }

    pub fn haptics(&self) -> usize {
        self.haptics.load(Ordering::SeqCst)
    }
}

impl FeedbackSink for CollectingFeedback {
    fn notify(&self, notice: UserNotice) {
        self.notices.lock().unwrap().push(notice);
    }

    fn haptic(&self) {
        self.haptics.fetch_add(1, Ordering::SeqCst);
    }
}
