//! # LC Test Utilities
//!
//! Shared test utilities for the Live Controller.
//!
//! This crate provides mock implementations of every external seam the
//! session core depends on, so orchestration behavior can be tested in
//! isolation without devices, a backend, or signaling.
//!
//! ## Modules
//!
//! - `mock_capture` - Scriptable capture backend (failures, hangs, delays)
//! - `mock_repository` - In-memory session store with failure injection
//! - `mock_peer` - Scripted peer connector (connect, stall, fail)
//! - `feedback` - Collecting feedback sink for notice/haptic assertions
//! - `fixtures` - `TestRig`: the full stack wired with the mocks above
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lc_test_utils::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_example() {
//!     let rig = TestRig::new();
//!     rig.wire_listener();
//!
//!     rig.coordinator.go_live();
//!     // ...
//! }
//! ```

pub mod feedback;
pub mod fixtures;
pub mod mock_capture;
pub mod mock_peer;
pub mod mock_repository;

// Re-export commonly used items
pub use feedback::*;
pub use fixtures::*;
pub use mock_capture::*;
pub use mock_peer::*;
pub use mock_repository::*;

use std::time::Duration;

/// Poll `cond` until it holds, panicking after a generous bound. Meant for
/// paused-clock tests where sleeps auto-advance.
pub async fn wait_until<F>(what: &str, cond: F)
where
    F: Fn() -> bool,
{
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        tokio::task::yield_now().await;
    }
    panic!("timed out waiting for {what}");
}
