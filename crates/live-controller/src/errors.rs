//! Live Controller error types.
//!
//! Raw capture failures (`CaptureError`, the platform-shaped exception set)
//! are normalized into the closed `MediaErrorCode` taxonomy at the media
//! manager boundary. Nothing above the manager inspects platform-native
//! error names.

use thiserror::Error;

use crate::media::peer::PeerError;

/// Closed error taxonomy for media failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum MediaErrorCode {
    /// Media init attempted for a disallowed target state. A sequencing
    /// problem, not a user-facing failure.
    StateBlock,
    /// The user declined camera/microphone access.
    PermissionDenied,
    /// No capture device present.
    DeviceNotFound,
    /// Device busy, unreadable, or watchdog timeout.
    HardwareError,
    /// Reserved for autoplay/policy-blocked playback.
    BrowserPolicy,
    /// Unclassified.
    Unknown,
}

/// A normalized media failure: taxonomy code, human message, optional
/// context bag.
#[derive(Debug, Clone, Error)]
#[error("{code:?}: {message}")]
pub struct MediaError {
    pub code: MediaErrorCode,
    pub message: String,
    pub context: Option<String>,
}

impl MediaError {
    #[must_use]
    pub fn new(code: MediaErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    #[must_use]
    pub fn state_block(message: impl Into<String>) -> Self {
        Self::new(MediaErrorCode::StateBlock, message)
    }

    #[must_use]
    pub fn hardware(message: impl Into<String>) -> Self {
        Self::new(MediaErrorCode::HardwareError, message)
    }

    /// Normalize a raw capture failure into the taxonomy.
    #[must_use]
    pub fn from_capture(err: &CaptureError) -> Self {
        let code = match err {
            CaptureError::NotAllowed(_) | CaptureError::Security(_) => {
                MediaErrorCode::PermissionDenied
            }
            CaptureError::NotFound(_) | CaptureError::Overconstrained(_) => {
                MediaErrorCode::DeviceNotFound
            }
            CaptureError::NotReadable(_) | CaptureError::Aborted(_) => {
                MediaErrorCode::HardwareError
            }
            CaptureError::Other(_) => MediaErrorCode::Unknown,
        };
        Self::new(code, "media acquisition failed").with_context(err.to_string())
    }
}

/// Raw capture-backend failures, shaped after the platform capture API's
/// exception names. Never propagated past the media manager.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// The user or a permissions policy denied the request.
    #[error("NotAllowedError: {0}")]
    NotAllowed(String),

    /// The request was blocked for security reasons (insecure context).
    #[error("SecurityError: {0}")]
    Security(String),

    /// No device satisfies the request.
    #[error("NotFoundError: {0}")]
    NotFound(String),

    /// A device exists but could not be opened (busy, hardware fault).
    #[error("NotReadableError: {0}")]
    NotReadable(String),

    /// Acquisition was aborted by the platform.
    #[error("AbortError: {0}")]
    Aborted(String),

    /// Constraints cannot be satisfied by any device.
    #[error("OverconstrainedError: {0}")]
    Overconstrained(String),

    /// Anything else.
    #[error("capture error: {0}")]
    Other(String),
}

/// Session persistence failures from the injected repository.
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// The backend could not be reached or rejected the write.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The session row does not exist.
    #[error("session not found: {0}")]
    NotFound(String),
}

/// Coordinator-level error: anything a session action can surface.
#[derive(Debug, Error)]
pub enum LiveError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("peer connection failed: {0}")]
    Peer(#[from] PeerError),

    #[error("session persistence failed: {0}")]
    Repository(#[from] RepositoryError),
}

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum NoticeSeverity {
    /// Transient, informational ("not ready yet").
    Info,
    /// Actionable but not broken (permission problems).
    Warning,
    /// Something is genuinely wrong (device/hardware problems).
    Error,
}

/// A user-facing message routed out of the core. Rendering is the UI's
/// concern; the core only classifies.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UserNotice {
    pub severity: NoticeSeverity,
    pub message: String,
}

impl UserNotice {
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: NoticeSeverity::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: NoticeSeverity::Warning,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: NoticeSeverity::Error,
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_normalization() {
        let cases = [
            (
                CaptureError::NotAllowed("denied".into()),
                MediaErrorCode::PermissionDenied,
            ),
            (
                CaptureError::Security("insecure context".into()),
                MediaErrorCode::PermissionDenied,
            ),
            (
                CaptureError::NotFound("no camera".into()),
                MediaErrorCode::DeviceNotFound,
            ),
            (
                CaptureError::Overconstrained("1080p".into()),
                MediaErrorCode::DeviceNotFound,
            ),
            (
                CaptureError::NotReadable("device busy".into()),
                MediaErrorCode::HardwareError,
            ),
            (
                CaptureError::Aborted("os interrupted".into()),
                MediaErrorCode::HardwareError,
            ),
            (
                CaptureError::Other("???".into()),
                MediaErrorCode::Unknown,
            ),
        ];

        for (raw, expected) in cases {
            let normalized = MediaError::from_capture(&raw);
            assert_eq!(normalized.code, expected, "wrong code for {raw:?}");
            // The raw detail survives in the context bag, not the message.
            assert!(normalized.context.is_some());
        }
    }

    #[test]
    fn test_media_error_display() {
        let err = MediaError::state_block("init blocked for SessionActive");
        assert_eq!(
            err.to_string(),
            "StateBlock: init blocked for SessionActive"
        );
    }
}
