//! End-to-end session flow tests.
//!
//! Drives the coordinator through full go-live / take-call / end-live
//! cycles with every external seam mocked, and checks the failure paths:
//! join rollback, persistence failure, re-entrant actions, queue haptics,
//! and lifecycle recovery.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use tokio::time::Instant;

use lc_test_utils::{wait_until, ConnectScript, TestRig};
use live_controller::errors::{CaptureError, LiveError, MediaErrorCode, NoticeSeverity};
use live_controller::media::{AppLifecycleEvent, MediaSink};
use live_controller::state::LiveState;

/// Drive a rig (with listener wired) from `Offline` to `SessionActive`.
async fn drive_to_active(rig: &TestRig, video: &MediaSink, audio: &MediaSink) {
    let preview = MediaSink::video();
    rig.coordinator.go_live();
    rig.coordinator.start_next(&preview);
    wait_until("preview acquired", || rig.manager.has_local_stream()).await;
    rig.coordinator
        .confirm_join(video, Some(audio))
        .await
        .expect("join should succeed");
    assert_eq!(rig.coordinator.state(), LiveState::SessionActive);
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_full_session_cycle() {
    let rig = TestRig::new();
    rig.wire_listener();
    let preview = MediaSink::video();
    let video = MediaSink::video();
    let audio = MediaSink::audio();

    assert_eq!(rig.coordinator.state(), LiveState::Offline);

    rig.coordinator.go_live();
    assert_eq!(rig.coordinator.state(), LiveState::LiveAvailable);

    rig.coordinator.start_next(&preview);
    assert_eq!(rig.coordinator.state(), LiveState::SessionPrep);
    wait_until("preview acquired", || rig.manager.has_local_stream()).await;
    assert!(preview.is_playing());

    rig.coordinator
        .confirm_join(&video, Some(&audio))
        .await
        .expect("join should succeed");
    assert_eq!(rig.coordinator.state(), LiveState::SessionActive);
    assert_eq!(rig.repository.create_calls(), 1);
    assert_eq!(rig.connector.connects(), 1);
    // The preview stream was reattached for the call, not re-acquired.
    assert_eq!(rig.capture.acquisitions(), 1);

    rig.coordinator.record_earnings(500);
    tokio::time::advance(Duration::from_secs(65)).await;

    let snapshot = rig.coordinator.snapshot();
    assert_eq!(snapshot.calls_taken, 1);
    assert!(snapshot.session_id.is_some());
    assert_eq!(snapshot.elapsed_display(), "00:01:05");
    assert_eq!(snapshot.earnings_display(), "$5.00");

    rig.coordinator.end_live().await.expect("end should persist");
    assert_eq!(rig.coordinator.state(), LiveState::LiveAvailable);
    assert!(!rig.manager.has_local_stream());
    assert!(!video.is_playing());

    let rows = rig.repository.sessions();
    assert_eq!(rows.len(), 1);
    let row = rows.first().unwrap();
    assert!(row.ended_at.is_some());
    assert_eq!(row.calls_taken, 1);
    assert_eq!(row.earnings_cents, 500);
    for track in rig.capture.tracks() {
        assert!(track.is_stopped());
    }
}

#[tokio::test(start_paused = true)]
async fn test_go_live_is_a_no_op_when_already_live() {
    let rig = TestRig::new();

    rig.coordinator.go_live();
    rig.coordinator.go_live();

    assert_eq!(rig.coordinator.state(), LiveState::LiveAvailable);
    assert_eq!(rig.capture.acquisitions(), 0, "go_live never touches media");
}

#[tokio::test(start_paused = true)]
async fn test_confirm_join_outside_prep_is_ignored() {
    let rig = TestRig::new();
    let video = MediaSink::video();

    rig.coordinator
        .confirm_join(&video, None)
        .await
        .expect("out-of-state join is a silent no-op");

    assert_eq!(rig.coordinator.state(), LiveState::Offline);
    assert_eq!(rig.capture.acquisitions(), 0);
    assert_eq!(rig.repository.create_calls(), 0);
}

// ============================================================================
// Join failure rollback
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_media_failure_rolls_back_to_prep() {
    // No commit listener: the rollback must not be masked by a lazy
    // preview re-acquisition.
    let rig = TestRig::new();
    let video = MediaSink::video();

    rig.coordinator.go_live();
    rig.coordinator.start_next(&MediaSink::video());
    rig.capture
        .fail_times(3, &CaptureError::NotAllowed("denied".into()));

    let err = rig
        .coordinator
        .confirm_join(&video, None)
        .await
        .expect_err("acquisition was scripted to fail");

    match err {
        LiveError::Media(media) => assert_eq!(media.code, MediaErrorCode::PermissionDenied),
        other => panic!("expected a media error, got {other:?}"),
    }
    assert_eq!(rig.coordinator.state(), LiveState::SessionPrep);
    assert!(!rig.manager.has_local_stream());
    assert_eq!(rig.repository.create_calls(), 0, "no row before media");
    assert_eq!(
        rig.feedback
            .notices_with_severity(NoticeSeverity::Warning)
            .len(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_peer_failure_rolls_back_and_releases_media() {
    let rig = TestRig::new();
    let video = MediaSink::video();
    rig.connector.set_script(ConnectScript::FailNegotiation);

    rig.coordinator.go_live();
    rig.coordinator.start_next(&MediaSink::video());

    let err = rig
        .coordinator
        .confirm_join(&video, None)
        .await
        .expect_err("negotiation was scripted to fail");

    assert!(matches!(err, LiveError::Peer(_)));
    assert_eq!(rig.coordinator.state(), LiveState::SessionPrep);
    assert!(!rig.manager.has_local_stream());
    // The row was created before negotiation; it stays behind as an
    // orphan for the backend to reap, but local state is clean.
    assert_eq!(rig.repository.create_calls(), 1);
    for track in rig.capture.tracks() {
        assert!(track.is_stopped());
    }
    assert!(!rig
        .feedback
        .notices_with_severity(NoticeSeverity::Error)
        .is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ice_timeout_rolls_back_to_prep() {
    let rig = TestRig::builder()
        .ice_timeout(Duration::from_secs(1))
        .build();
    let video = MediaSink::video();
    rig.connector.set_script(ConnectScript::Stall);

    rig.coordinator.go_live();
    rig.coordinator.start_next(&MediaSink::video());

    let err = rig
        .coordinator
        .confirm_join(&video, None)
        .await
        .expect_err("stalled negotiation should time out");

    assert!(matches!(err, LiveError::Peer(_)));
    assert_eq!(rig.coordinator.state(), LiveState::SessionPrep);
    assert!(!rig.manager.has_local_stream());
}

// ============================================================================
// Ending
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_persistence_failure_still_releases_media_and_recovers() {
    let rig = TestRig::new();
    rig.wire_listener();
    let video = MediaSink::video();
    let audio = MediaSink::audio();
    drive_to_active(&rig, &video, &audio).await;

    rig.repository.set_fail_close(true);
    let err = rig
        .coordinator
        .end_live()
        .await
        .expect_err("close was scripted to fail");

    assert!(matches!(err, LiveError::Repository(_)));
    // Camera released regardless; the creator stays available.
    assert!(!rig.manager.has_local_stream());
    assert_eq!(rig.coordinator.state(), LiveState::LiveAvailable);
    assert!(rig.coordinator.snapshot().session_id.is_none());
    assert!(!rig
        .feedback
        .notices_with_severity(NoticeSeverity::Warning)
        .is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_end_live_without_a_session_is_ignored() {
    let rig = TestRig::new();
    rig.coordinator.go_live();

    rig.coordinator.end_live().await.expect("no-op");

    assert_eq!(rig.coordinator.state(), LiveState::LiveAvailable);
    assert_eq!(rig.repository.close_calls(), 0);
}

// ============================================================================
// Re-entrancy
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_mashed_confirm_join_runs_once() {
    let rig = TestRig::new();
    rig.capture.set_delay(Duration::from_millis(100));
    let video = MediaSink::video();

    rig.coordinator.go_live();
    rig.coordinator.start_next(&MediaSink::video());

    let (first, second) = tokio::join!(
        rig.coordinator.confirm_join(&video, None),
        rig.coordinator.confirm_join(&video, None),
    );

    first.expect("real join");
    second.expect("duplicate is a silent no-op");
    assert_eq!(rig.capture.acquisitions(), 1);
    assert_eq!(rig.repository.create_calls(), 1);
    assert_eq!(rig.connector.connects(), 1);
    assert_eq!(rig.coordinator.snapshot().calls_taken, 1);
}

#[tokio::test(start_paused = true)]
async fn test_mashed_end_live_closes_once() {
    let rig = TestRig::new();
    rig.wire_listener();
    let video = MediaSink::video();
    let audio = MediaSink::audio();
    drive_to_active(&rig, &video, &audio).await;

    let (first, second) = tokio::join!(rig.coordinator.end_live(), rig.coordinator.end_live());

    first.expect("real end");
    second.expect("duplicate is a silent no-op");
    assert_eq!(rig.repository.close_calls(), 1);
    assert_eq!(rig.coordinator.state(), LiveState::LiveAvailable);
}

// ============================================================================
// Queue and haptics
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_queue_joins_are_haptic_rate_limited() {
    let rig = TestRig::builder()
        .haptic_cooldown(Duration::from_secs(5))
        .build();

    rig.coordinator.handle_queue_join();
    rig.coordinator.handle_queue_join();
    assert_eq!(rig.feedback.haptics(), 1, "second pulse inside cooldown");
    assert_eq!(rig.coordinator.snapshot().queue_count, 2);

    tokio::time::advance(Duration::from_secs(6)).await;
    rig.coordinator.handle_queue_join();
    assert_eq!(rig.feedback.haptics(), 2);

    rig.coordinator
        .mute_haptics_until(Instant::now() + Duration::from_secs(60));
    tokio::time::advance(Duration::from_secs(6)).await;
    rig.coordinator.handle_queue_join();
    assert_eq!(rig.feedback.haptics(), 2, "muted pulse must not fire");
    assert_eq!(rig.coordinator.snapshot().queue_count, 4);
}

#[tokio::test(start_paused = true)]
async fn test_queue_count_never_underflows() {
    let rig = TestRig::new();

    rig.coordinator.handle_queue_join();
    rig.coordinator.handle_queue_leave();
    rig.coordinator.handle_queue_leave();

    assert_eq!(rig.coordinator.snapshot().queue_count, 0);
}

// ============================================================================
// Lifecycle and recovery
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_hidden_app_releases_media_mid_prep() {
    let rig = TestRig::new();
    rig.wire_listener();
    rig.wire_lifecycle();
    let preview = MediaSink::video();

    rig.coordinator.go_live();
    rig.coordinator.start_next(&preview);
    wait_until("preview acquired", || rig.manager.has_local_stream()).await;

    rig.lifecycle.publish(AppLifecycleEvent::Hidden);
    wait_until("media released after hidden", || {
        !rig.manager.has_local_stream()
    })
    .await;

    // The safety net is media-level only; session state is untouched.
    assert_eq!(rig.coordinator.state(), LiveState::SessionPrep);
    assert!(!preview.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_reset_returns_to_offline_from_an_active_session() {
    let rig = TestRig::new();
    rig.wire_listener();
    let video = MediaSink::video();
    let audio = MediaSink::audio();
    drive_to_active(&rig, &video, &audio).await;
    rig.coordinator.handle_queue_join();

    rig.coordinator.reset().await;

    let snapshot = rig.coordinator.snapshot();
    assert_eq!(snapshot.state, LiveState::Offline);
    assert!(snapshot.session_id.is_none());
    assert_eq!(snapshot.queue_count, 0);
    assert!(!rig.manager.has_local_stream());
}
