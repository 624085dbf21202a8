//! 수퍼바이저 통합 테스트
//!
//! 작업 디렉토리에 셸 스크립트를 만들어 감독 대상 서버로 사용합니다.

#![cfg(unix)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use warden_core::bus::{EventBus, EventHandler};
use warden_core::event::{Event, FIELD_EXIT_CODE, KIND_SERVER_CRASHED, PRIORITY_NORMAL};
use warden_core::types::{OutputLine, ProcessState, StreamKind};
use warden_supervisor::{ServerSupervisor, SupervisorConfigBuilder};

const FAKE_SERVER: &str = r#"#!/bin/sh
echo "[12:00:00] [Server thread/INFO]: Starting minecraft server"
echo "[12:00:01] [Server thread/WARN]: Can't keep up!" >&2
echo "[12:00:02] [Server thread/INFO]: Done (1.234s)! For help, type \"help\""
while read -r line; do
    case "$line" in
        stop)
            echo "[12:00:09] [Server thread/INFO]: Stopping server"
            exit 0
            ;;
        crash)
            echo "Exception in server tick loop" >&2
            exit 70
            ;;
        *)
            echo "[12:00:05] [Server thread/INFO]: $line"
            ;;
    esac
done
"#;

fn fake_server_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("server.sh"), FAKE_SERVER).unwrap();
    dir
}

async fn next_line(rx: &mut mpsc::Receiver<OutputLine>) -> OutputLine {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for output")
        .expect("line channel closed")
}

#[tokio::test]
async fn supervised_server_output_reaches_line_channel() {
    let dir = fake_server_dir();
    let config = SupervisorConfigBuilder::new()
        .command("/bin/sh", &["server.sh"])
        .working_dir(dir.path().to_string_lossy())
        .stop_grace_secs(5)
        .build()
        .unwrap();
    let (line_tx, mut line_rx) = mpsc::channel(64);
    let supervisor = ServerSupervisor::new(config, Arc::new(EventBus::new()), line_tx);

    supervisor.start().await.unwrap();

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    while stdout.len() < 2 || stderr.is_empty() {
        let line = next_line(&mut line_rx).await;
        match line.stream {
            StreamKind::Stdout => stdout.push(line.text),
            StreamKind::Stderr => stderr.push(line.text),
        }
    }
    assert!(stdout[0].ends_with("Starting minecraft server"));
    assert!(stdout[1].contains("Done (1.234s)!"));
    assert!(stderr[0].ends_with("Can't keep up!"));

    supervisor.send_line("list").await.unwrap();
    let line = next_line(&mut line_rx).await;
    assert!(line.text.ends_with("INFO]: list"));

    supervisor.stop(false).await.unwrap();
    let line = next_line(&mut line_rx).await;
    assert!(line.text.ends_with("Stopping server"));
    assert_eq!(supervisor.state(), ProcessState::Stopped);
}

#[tokio::test]
async fn crash_after_command_reports_exit_code() {
    let dir = fake_server_dir();
    let config = SupervisorConfigBuilder::new()
        .command("/bin/sh", &["server.sh"])
        .working_dir(dir.path().to_string_lossy())
        .build()
        .unwrap();
    let bus = Arc::new(EventBus::new());
    let crashes = Arc::new(Mutex::new(Vec::<Event>::new()));
    let sink = Arc::clone(&crashes);
    bus.register(
        KIND_SERVER_CRASHED,
        PRIORITY_NORMAL,
        EventHandler::sync("crash-recorder", move |event: &Event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        }),
    )
    .unwrap();

    let (line_tx, mut line_rx) = mpsc::channel(64);
    let supervisor = ServerSupervisor::new(config, bus, line_tx);
    supervisor.start().await.unwrap();
    let mut state_rx = supervisor.subscribe_state();

    supervisor.send_line("crash").await.unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        state_rx.wait_for(|s| *s == ProcessState::Crashed),
    )
    .await
    .unwrap()
    .unwrap();

    let crashes = crashes.lock().unwrap();
    assert_eq!(crashes.len(), 1);
    assert_eq!(crashes[0].field(FIELD_EXIT_CODE), Some("70"));
    assert!(supervisor.stderr_tail().contains(&"Exception in server tick loop".to_owned()));

    // 크래시 후 send_line 은 NotRunning 으로 실패합니다.
    assert!(supervisor.send_line("list").await.is_err());

    // 출력 채널에는 크래시 직전 stderr 도 전달되어 있어야 합니다.
    let mut saw_exception = false;
    while let Ok(line) = line_rx.try_recv() {
        saw_exception |= line.text == "Exception in server tick loop";
    }
    assert!(saw_exception);
}

#[tokio::test]
async fn concurrent_lifecycle_calls_are_serialized() {
    let dir = fake_server_dir();
    let config = SupervisorConfigBuilder::new()
        .command("/bin/sh", &["server.sh"])
        .working_dir(dir.path().to_string_lossy())
        .build()
        .unwrap();
    let (line_tx, _line_rx) = mpsc::channel(64);
    let supervisor = ServerSupervisor::new(config, Arc::new(EventBus::new()), line_tx);

    let a = supervisor.clone();
    let b = supervisor.clone();
    let (first, second) = tokio::join!(a.start(), b.start());

    // 정확히 하나만 성공합니다.
    assert!(first.is_ok() ^ second.is_ok());
    assert!(supervisor.is_alive());

    supervisor.stop(false).await.unwrap();
}
