//! Live Controller configuration.
//!
//! Configuration is loaded from environment variables with sensible
//! defaults; only the creator identity is required.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::media::manager::{ManagerSettings, RetryPolicy};
use crate::orchestrator::WatchdogSettings;
use crate::session::coordinator::CoordinatorSettings;

/// Default acquisition watchdog window in milliseconds.
pub const DEFAULT_WATCHDOG_MS: u64 = 8000;

/// Default acquisition attempts per start call.
pub const DEFAULT_MEDIA_RETRY_ATTEMPTS: u32 = 3;

/// Default base backoff between acquisition attempts in milliseconds.
pub const DEFAULT_MEDIA_RETRY_BACKOFF_MS: u64 = 300;

/// Default bounded wait for the opposite start/stop operation in
/// milliseconds.
pub const DEFAULT_HANDOFF_WAIT_MS: u64 = 1500;

/// Default poll interval during the handoff wait in milliseconds.
pub const DEFAULT_HANDOFF_POLL_MS: u64 = 50;

/// Default ICE connectivity deadline in milliseconds.
pub const DEFAULT_ICE_TIMEOUT_MS: u64 = 15_000;

/// Default minimum spacing between haptic pulses in milliseconds.
pub const DEFAULT_HAPTIC_COOLDOWN_MS: u64 = 5000;

/// Live Controller configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// The creator this controller runs for.
    pub creator_id: String,

    /// Whether the acquisition watchdog is armed (default: true).
    pub enable_watchdog: bool,

    /// Watchdog window in milliseconds (default: 8000).
    pub watchdog_ms: u64,

    /// Acquisition attempts per start call (default: 3).
    pub media_retry_attempts: u32,

    /// Base backoff between attempts in milliseconds (default: 300).
    pub media_retry_backoff_ms: u64,

    /// Bounded start/stop handoff wait in milliseconds (default: 1500).
    pub handoff_wait_ms: u64,

    /// Handoff poll interval in milliseconds (default: 50).
    pub handoff_poll_ms: u64,

    /// ICE connectivity deadline in milliseconds (default: 15000).
    pub ice_timeout_ms: u64,

    /// Minimum spacing between haptic pulses in milliseconds (default: 5000).
    pub haptic_cooldown_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a numeric variable, falling back to `default` only when the
/// variable is absent. A present-but-unparsable value is a configuration
/// error, not a silent default.
fn parse_var<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{key}: {raw:?}"))),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let creator_id = vars
            .get("LIVE_CREATOR_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("LIVE_CREATOR_ID".to_string()))?
            .clone();

        let enable_watchdog = match vars.get("LIVE_ENABLE_WATCHDOG") {
            Some(raw) => parse_bool(raw).ok_or_else(|| {
                ConfigError::InvalidValue(format!("LIVE_ENABLE_WATCHDOG: {raw:?}"))
            })?,
            None => true,
        };

        let watchdog_ms = parse_var(vars, "LIVE_WATCHDOG_MS", DEFAULT_WATCHDOG_MS)?;

        let media_retry_attempts = parse_var(
            vars,
            "LIVE_MEDIA_RETRY_ATTEMPTS",
            DEFAULT_MEDIA_RETRY_ATTEMPTS,
        )?;

        let media_retry_backoff_ms = parse_var(
            vars,
            "LIVE_MEDIA_RETRY_BACKOFF_MS",
            DEFAULT_MEDIA_RETRY_BACKOFF_MS,
        )?;

        let handoff_wait_ms = parse_var(vars, "LIVE_HANDOFF_WAIT_MS", DEFAULT_HANDOFF_WAIT_MS)?;

        let handoff_poll_ms = parse_var(vars, "LIVE_HANDOFF_POLL_MS", DEFAULT_HANDOFF_POLL_MS)?;

        let ice_timeout_ms = parse_var(vars, "LIVE_ICE_TIMEOUT_MS", DEFAULT_ICE_TIMEOUT_MS)?;

        let haptic_cooldown_ms =
            parse_var(vars, "LIVE_HAPTIC_COOLDOWN_MS", DEFAULT_HAPTIC_COOLDOWN_MS)?;

        Ok(Config {
            creator_id,
            enable_watchdog,
            watchdog_ms,
            media_retry_attempts,
            media_retry_backoff_ms,
            handoff_wait_ms,
            handoff_poll_ms,
            ice_timeout_ms,
            haptic_cooldown_ms,
        })
    }

    /// Handoff knobs for the media manager.
    #[must_use]
    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            handoff_wait: Duration::from_millis(self.handoff_wait_ms),
            handoff_poll: Duration::from_millis(self.handoff_poll_ms),
        }
    }

    /// Watchdog knobs for the orchestrator.
    #[must_use]
    pub fn watchdog_settings(&self) -> WatchdogSettings {
        WatchdogSettings {
            enabled: self.enable_watchdog,
            timeout: Duration::from_millis(self.watchdog_ms),
        }
    }

    /// Acquisition retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.media_retry_attempts,
            backoff: Duration::from_millis(self.media_retry_backoff_ms),
        }
    }

    /// Coordinator knobs.
    #[must_use]
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            creator_id: self.creator_id.clone(),
            ice_timeout: Duration::from_millis(self.ice_timeout_ms),
            haptic_cooldown: Duration::from_millis(self.haptic_cooldown_ms),
            media_retry: self.retry_policy(),
        }
    }
}
