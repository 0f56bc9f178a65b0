mod support;

use helm_application::view::NoticeAction;
use helm_application::{RecordingController, ResourceManager, ViewBus, ViewUpdate};
use helm_core::channel::BackendCommand;
use helm_core::error::HelmError;
use helm_core::recording::{RecordingState, RecordingStatus};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use support::{MockChannel, drain, settle};

async fn controller(active_model: bool) -> (Arc<MockChannel>, ViewBus, RecordingController) {
    let channel = Arc::new(MockChannel::new());
    let bus = ViewBus::new(256);
    channel.reply(
        BackendCommand::GetStatus,
        json!({
            "artifacts": [
                { "id": "base.en", "label": "Base", "sizeBytes": 1, "downloaded": true, "active": active_model }
            ]
        }),
    );
    let resources = Arc::new(ResourceManager::new(channel.clone(), bus.clone()));
    resources.status().await.unwrap();
    let controller = RecordingController::new(
        channel.clone(),
        bus.clone(),
        resources,
        Duration::from_secs(1),
    );
    (channel, bus, controller)
}

#[tokio::test(start_paused = true)]
async fn test_start_requires_active_artifact() {
    let (channel, bus, controller) = controller(false).await;
    let mut rx = bus.subscribe();

    let err = controller.start().await.unwrap_err();

    assert!(matches!(err, HelmError::NoActiveArtifact));
    assert_eq!(controller.snapshot().await.state, RecordingState::Idle);
    assert!(channel.calls_named("start-recording").is_empty());
    let action = drain(&mut rx).into_iter().find_map(|u| match u {
        ViewUpdate::Notice { notice } => notice.action,
        _ => None,
    });
    assert_eq!(action, Some(NoticeAction::OpenResourceManager));
}

#[tokio::test(start_paused = true)]
async fn test_start_sends_session_and_artifact() {
    let (channel, _bus, controller) = controller(true).await;

    let session_id = controller.start().await.unwrap();

    assert_eq!(
        channel.calls_named("start-recording"),
        vec![BackendCommand::StartRecording {
            session_id: session_id.clone(),
            artifact_id: "base.en".into(),
        }]
    );
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.state, RecordingState::Recording);
    assert_eq!(snapshot.session_id, Some(session_id));
}

#[tokio::test(start_paused = true)]
async fn test_pause_resume_keeps_elapsed_continuous() {
    let (_channel, _bus, controller) = controller(true).await;
    controller.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(3_200)).await;
    controller.pause().await.unwrap();
    let at_pause = controller.snapshot().await.elapsed_seconds;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(controller.snapshot().await.elapsed_seconds, at_pause);

    controller.resume().await.unwrap();
    let at_resume = controller.snapshot().await.elapsed_seconds;
    assert!(at_resume.abs_diff(at_pause) <= 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    controller.stop().await.unwrap();

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.state, RecordingState::Stopped);
    assert_eq!(snapshot.elapsed_seconds, 5);
    assert_eq!(snapshot.segments.len(), 2);
    assert_eq!(snapshot.segments[0].started_at_elapsed, 0);
    assert_eq!(snapshot.segments[0].duration_seconds, 3);
    assert_eq!(snapshot.segments[1].started_at_elapsed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_start_restores_previous_state() {
    let (channel, _bus, controller) = controller(true).await;
    channel.fail("start-recording", "microphone unavailable");

    assert!(controller.start().await.unwrap_err().is_transport());

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.state, RecordingState::Idle);
    assert_eq!(snapshot.session_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_pause_keeps_recording() {
    let (channel, _bus, controller) = controller(true).await;
    controller.start().await.unwrap();
    channel.fail("pause-recording", "pipeline busy");

    assert!(controller.pause().await.is_err());

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.state, RecordingState::Recording);
    assert!(snapshot.segments.is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(controller.snapshot().await.elapsed_seconds, 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_pause_does_not_undo_acknowledged_stop() {
    let (channel, _bus, controller) = controller(true).await;
    let session_id = controller.start().await.unwrap();
    let release = channel.gated_failure("pause-recording", "pipeline busy");

    let pausing = controller.clone();
    let pause = tokio::spawn(async move { pausing.pause().await });
    settle().await;
    assert_eq!(controller.snapshot().await.state, RecordingState::Paused);

    controller.stop().await.unwrap();
    release.send(()).unwrap();
    assert!(pause.await.unwrap().is_err());

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.state, RecordingState::Stopped);
    assert_eq!(snapshot.session_id, Some(session_id));
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_terminal_and_restart_allocates_new_id() {
    let (_channel, _bus, controller) = controller(true).await;
    let first = controller.start().await.unwrap();
    controller.stop().await.unwrap();

    assert!(matches!(
        controller.resume().await,
        Err(HelmError::InvalidRecordingState { .. })
    ));
    assert!(matches!(
        controller.pause().await,
        Err(HelmError::InvalidRecordingState { .. })
    ));

    let second = controller.start().await.unwrap();
    assert_ne!(first, second);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_transitions_from_idle() {
    let (channel, _bus, controller) = controller(true).await;

    assert!(controller.pause().await.is_err());
    assert!(controller.stop().await.is_err());
    assert!(channel.calls_named("pause-recording").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_attach_prefers_backend_elapsed() {
    let (_channel, _bus, controller) = controller(true).await;
    controller.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(4)).await;

    controller
        .attach(Some(RecordingStatus {
            session_id: "rec-backend".into(),
            state: RecordingState::Recording,
            elapsed_seconds: 95,
        }))
        .await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.session_id.as_deref(), Some("rec-backend"));
    assert_eq!(snapshot.elapsed_seconds, 95);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(controller.snapshot().await.elapsed_seconds, 100);
}

#[tokio::test(start_paused = true)]
async fn test_attach_to_paused_session_keeps_clock_frozen() {
    let (_channel, _bus, controller) = controller(true).await;

    controller
        .attach(Some(RecordingStatus {
            session_id: "rec-1".into(),
            state: RecordingState::Paused,
            elapsed_seconds: 42,
        }))
        .await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.state, RecordingState::Paused);
    assert_eq!(snapshot.elapsed_seconds, 42);
}

#[tokio::test(start_paused = true)]
async fn test_ticker_publishes_while_recording() {
    let (_channel, _bus, controller) = controller(true).await;
    let mut state = controller.subscribe();
    controller.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(state.borrow_and_update().elapsed_seconds, 3);

    controller.pause().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(state.borrow_and_update().elapsed_seconds, 3);
    assert_eq!(state.borrow().state, RecordingState::Paused);
}
