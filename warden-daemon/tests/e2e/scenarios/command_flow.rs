//! Full daemon wiring against a fake `/bin/sh` server:
//! config -> orchestrator -> supervisor + log pipeline + dispatcher -> queue client.

#![cfg(unix)]

use std::time::Duration;

use tokio::sync::mpsc;

use warden_command_queue::{CommandOutcome, CommandQueueConfig, QueueClient};
use warden_core::bus::EventHandler;
use warden_core::event::{
    Event, FIELD_EXIT_CODE, FIELD_STDERR_TAIL, KIND_COMMAND_COMPLETED, KIND_SERVER_CRASHED,
    PRIORITY_NORMAL,
};
use warden_core::pipeline::HealthStatus;
use warden_core::types::ProcessState;
use warden_daemon::orchestrator::Orchestrator;

use crate::helpers::fake_server::fake_server_config;

/// Forward every `kind` event into a channel the test can await.
fn watch_kind(orchestrator: &Orchestrator, kind: &str) -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    orchestrator
        .bus()
        .register(
            kind,
            PRIORITY_NORMAL,
            EventHandler::sync(format!("watch-{kind}"), move |event: &Event| {
                let _ = tx.send(event.clone());
                Ok(())
            }),
        )
        .unwrap();
    rx
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("event did not arrive in time")
        .expect("event channel closed")
}

#[tokio::test]
async fn queued_command_round_trips_through_running_server() {
    let dir = tempfile::tempdir().unwrap();
    let config = fake_server_config(&dir);
    let client = QueueClient::from_config(&CommandQueueConfig::from_core(&config.queue)).unwrap();

    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    let mut ready = watch_kind(&orchestrator, "ServerReady");
    let mut completed = watch_kind(&orchestrator, KIND_COMMAND_COMPLETED);

    orchestrator.start().await.unwrap();
    next(&mut ready).await;
    assert_eq!(orchestrator.health().await.status, HealthStatus::Healthy);

    let id = client.enqueue("list").await.unwrap();
    let outcome = client
        .wait_for_completion(id, Duration::from_secs(10))
        .await
        .unwrap();

    let CommandOutcome::Completed(command) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(
        command.result.as_deref(),
        Some("[12:00:05] [Server thread/INFO]: There are 1 of a max of 20 players online: Alice")
    );
    assert_eq!(
        next(&mut completed).await.field("command_id"),
        Some(id.to_string().as_str())
    );

    orchestrator.shutdown().await.unwrap();
    assert_eq!(orchestrator.supervisor().state(), ProcessState::Stopped);
}

#[tokio::test]
async fn crash_is_reported_with_stderr_tail() {
    let dir = tempfile::tempdir().unwrap();
    let config = fake_server_config(&dir);
    let client = QueueClient::from_config(&CommandQueueConfig::from_core(&config.queue)).unwrap();

    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    let mut ready = watch_kind(&orchestrator, "ServerReady");
    let mut crashes = watch_kind(&orchestrator, KIND_SERVER_CRASHED);

    orchestrator.start().await.unwrap();
    next(&mut ready).await;

    client.enqueue("crash").await.unwrap();
    let crash = next(&mut crashes).await;
    assert_eq!(crash.field(FIELD_EXIT_CODE), Some("3"));
    assert!(
        crash
            .field(FIELD_STDERR_TAIL)
            .is_some_and(|tail| tail.contains("OutOfMemoryError"))
    );

    assert_eq!(orchestrator.supervisor().state(), ProcessState::Crashed);
    assert!(orchestrator.health().await.status.is_unhealthy());

    // 이미 종료된 서버에 대한 stop 은 no-op 이므로 종료 절차는 성공해야 합니다.
    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn commands_fail_fast_after_server_stops() {
    let dir = tempfile::tempdir().unwrap();
    let config = fake_server_config(&dir);
    let client = QueueClient::from_config(&CommandQueueConfig::from_core(&config.queue)).unwrap();

    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    let mut ready = watch_kind(&orchestrator, "ServerReady");
    orchestrator.start().await.unwrap();
    next(&mut ready).await;

    orchestrator.supervisor().stop(false).await.unwrap();
    let id = client.enqueue("list").await.unwrap();
    let outcome = client
        .wait_for_completion(id, Duration::from_secs(10))
        .await
        .unwrap();

    let CommandOutcome::Failed(command) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(command.sent_at.is_none());
    assert!(command.error.unwrap().contains("not running"));

    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_executable_fails_startup_and_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fake_server_config(&dir);
    config.server.executable = dir
        .path()
        .join("no-such-server")
        .to_string_lossy()
        .into_owned();
    config.server.args.clear();

    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    let err = orchestrator.start().await.unwrap_err();
    assert!(err.to_string().contains("supervisor"), "unexpected error: {err}");
    assert_eq!(orchestrator.supervisor().state(), ProcessState::Stopped);

    let health = orchestrator.health().await;
    assert!(health.status.is_unhealthy());
}
