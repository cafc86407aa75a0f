//! Live Controller library
//!
//! This library provides the core functionality for the Stagewire Live
//! Controller - the creator-side live-session orchestration core responsible
//! for:
//!
//! - The going-live lifecycle state machine (offline → available → prep →
//!   joining → active → teardown)
//! - Camera/microphone stream lifecycle with retry, coalescing and
//!   idempotent teardown
//! - Watchdog-guarded media acquisition gated on committed state transitions
//! - Session persistence sequencing (create on join, close on end)
//!
//! # Architecture
//!
//! ```text
//! UI gesture ──> LiveSessionCoordinator (sole caller of `transition`)
//!                    │ commits StateCommit on a broadcast channel
//!                    ▼
//!                MediaOrchestrator (gating, watchdog, commit listener)
//!                    │
//!                    ▼
//!                MediaManager (exclusive owner of the local stream,
//!                              peer link and attached sinks)
//!                    │
//!                    ▼
//!                CaptureBackend (platform capture seam)
//! ```
//!
//! # Key Design Decisions
//!
//! - **Committed-state gating**: hardware acquisition follows a *committed*
//!   state transition, never a requested one, so a guard rejection can never
//!   leave a camera running for a state that was rolled back.
//! - **Single stream owner**: the `MediaManager` is the only component that
//!   touches the capture backend or holds the local stream; consumers borrow
//!   through its accessors and must re-query after any lifecycle event.
//! - **Closed error taxonomy**: raw capture failures are normalized at the
//!   manager boundary; nothing above it inspects platform-native error names.
//!
//! # Modules
//!
//! - [`state`] - Pure lifecycle state machine and guard predicates
//! - [`media`] - Stream/track/sink primitives, capture seam, media manager
//! - [`orchestrator`] - Init gating, watchdog, commit listener, error routing
//! - [`session`] - Session coordinator and persistence seam
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error taxonomy and user-facing notices

pub mod config;
pub mod errors;
pub mod media;
pub mod orchestrator;
pub mod session;
pub mod state;
