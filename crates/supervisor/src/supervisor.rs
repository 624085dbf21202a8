//! 서버 프로세스 수퍼바이저
//!
//! [`ServerSupervisor`]는 감독 대상 서버 하나의 생명주기와 세 개의 I/O 채널을 소유합니다.
//!
//! # 내부 아키텍처
//! ```text
//!                     ┌── stdout reader ──┐
//! child process ──────┼── stderr reader ──┼──▶ mpsc<OutputLine> ──▶ LogPipeline
//!    ▲                │        └─▶ stderr tail
//!    │ stdin writer ◀─┘
//!    └── health watcher (owns Child) ──▶ exit watch ──▶ stop() / crash 처리
//! ```
//!
//! 생명주기 메서드(`start`/`stop`/`restart`)는 `lifecycle` 락으로 직렬화됩니다.
//! 상태는 `watch` 채널에 있으므로 조회 메서드는 락 없이 호출할 수 있습니다.

use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use warden_core::bus::EventBus;
use warden_core::event::{
    Event, FIELD_EXIT_CODE, FIELD_FROM, FIELD_PID, FIELD_STDERR_TAIL, FIELD_TO,
    KIND_SERVER_CRASHED, KIND_SERVER_STARTED, KIND_SERVER_STATE_CHANGED, KIND_SERVER_STOPPED,
    PRIORITY_HIGH,
};
use warden_core::metrics as m;
use warden_core::error::WardenError;
use warden_core::pipeline::{BoxFuture, HealthStatus, LineSink, Pipeline, SinkError};
use warden_core::types::{OutputLine, ProcessState, StreamKind};

use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::io::{LineTail, StdinWriter, read_lines};
use crate::process::{self, ProcessMetrics, ProcessSampler};

/// 쓰기 실패 후 health watcher 가 종료를 보고할 때까지 기다리는 시간
const WRITE_FAILURE_PROBE: Duration = Duration::from_millis(500);

/// 프로세스 종료 후 reader 가 남은 출력을 비울 때까지 기다리는 시간
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 종료된 프로세스 정보
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// 종료 코드 (시그널로 종료된 경우 None)
    pub code: Option<i32>,
}

impl ExitInfo {
    fn code_string(&self) -> String {
        self.code
            .map_or_else(|| "signal".to_owned(), |code| code.to_string())
    }
}

/// 실행 중인 프로세스 하나에 대한 핸들
struct Session {
    stdin: StdinWriter,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
    kill_tx: Option<oneshot::Sender<()>>,
    watcher: JoinHandle<()>,
}

impl Session {
    /// health watcher 에게 강제 종료를 요청합니다.
    fn kill(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            let _ = tx.send(());
        }
    }

    async fn wait_exit(&mut self, timeout: Duration) -> Option<ExitInfo> {
        let result = tokio::time::timeout(timeout, self.exit_rx.wait_for(Option::is_some)).await;
        match result {
            Ok(Ok(exit)) => *exit,
            // watcher 가 사라졌으면 종료 정보 없이 종료된 것으로 봅니다.
            Ok(Err(_)) => Some(ExitInfo { code: None }),
            Err(_) => None,
        }
    }
}

struct Inner {
    config: SupervisorConfig,
    bus: Arc<EventBus>,
    line_tx: mpsc::Sender<OutputLine>,
    lifecycle: tokio::sync::Mutex<()>,
    state_tx: watch::Sender<ProcessState>,
    pid: AtomicU32,
    session: Mutex<Option<Session>>,
    stderr_tail: Arc<LineTail>,
    sampler: ProcessSampler,
}

/// 게임 서버 프로세스 수퍼바이저
///
/// 복제 비용이 싼 핸들입니다. 모든 복제본은 같은 프로세스를 가리킵니다.
///
/// # 사용 예시
/// ```ignore
/// let supervisor = ServerSupervisor::new(config, bus, line_tx);
/// supervisor.start().await?;
/// supervisor.send_line("list").await?;
/// supervisor.stop(false).await?;
/// ```
#[derive(Clone)]
pub struct ServerSupervisor {
    inner: Arc<Inner>,
}

impl ServerSupervisor {
    /// 새 수퍼바이저를 생성합니다. 초기 상태는 `Stopped`입니다.
    ///
    /// `line_tx`로 stdout/stderr 라인이 전달됩니다.
    pub fn new(
        config: SupervisorConfig,
        bus: Arc<EventBus>,
        line_tx: mpsc::Sender<OutputLine>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ProcessState::Stopped);
        let stderr_tail = Arc::new(LineTail::new(config.stderr_tail_lines));
        Self {
            inner: Arc::new(Inner {
                config,
                bus,
                line_tx,
                lifecycle: tokio::sync::Mutex::new(()),
                state_tx,
                pid: AtomicU32::new(0),
                session: Mutex::new(None),
                stderr_tail,
                sampler: ProcessSampler::new(),
            }),
        }
    }

    /// 서버를 시작합니다.
    ///
    /// `Stopped`/`Crashed`가 아니면 [`SupervisorError::AlreadyRunning`]을 반환합니다.
    pub async fn start(&self) -> Result<u32, SupervisorError> {
        let _guard = self.inner.lifecycle.lock().await;
        self.inner.start_locked().await
    }

    /// 서버를 정지합니다.
    ///
    /// `force = false`이면 stdin 으로 stop 명령을, `true`이면 종료 시그널을 보낸 뒤
    /// grace period 동안 기다리고, 초과하면 강제 종료합니다.
    /// 이미 `Stopped`/`Crashed`이면 아무 일도 하지 않고 성공합니다.
    pub async fn stop(&self, force: bool) -> Result<(), SupervisorError> {
        let _guard = self.inner.lifecycle.lock().await;
        self.inner.stop_locked(force).await
    }

    /// `stop(false)` 후 `start()`를 수행합니다. 정지에 실패하면 시작하지 않습니다.
    pub async fn restart(&self) -> Result<u32, SupervisorError> {
        let _guard = self.inner.lifecycle.lock().await;
        self.inner.stop_locked(false).await?;
        self.inner.start_locked().await
    }

    /// stdin 으로 한 줄을 보냅니다.
    ///
    /// 쓰기 실패 시 크래시 감지를 위해 health watcher 의 종료 보고를 잠시 기다립니다.
    pub async fn send_line(&self, text: &str) -> Result<(), SupervisorError> {
        let state = self.state();
        if state != ProcessState::Running {
            return Err(SupervisorError::NotRunning {
                state: state.to_string(),
            });
        }

        let text = text.trim_end_matches(['\r', '\n']);
        if text.contains('\n') {
            return Err(SupervisorError::WriteError(
                "line must not contain a newline".to_owned(),
            ));
        }

        let (writer, exit_rx) = {
            let session = self.inner.session.lock().unwrap_or_else(|e| e.into_inner());
            match session.as_ref() {
                Some(s) => (s.stdin.clone(), s.exit_rx.clone()),
                None => {
                    return Err(SupervisorError::NotRunning {
                        state: self.state().to_string(),
                    });
                }
            }
        };

        match writer.write_line(text).await {
            Ok(()) => {
                metrics::counter!(m::SUPERVISOR_LINES_SENT_TOTAL).increment(1);
                tracing::debug!(line = text, "sent line to server stdin");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "stdin write failed, probing server health");
                probe_exit(exit_rx).await;
                Err(SupervisorError::WriteError(e.to_string()))
            }
        }
    }

    /// 런타임 밖의 호출자를 위한 `send_line` 래퍼입니다.
    ///
    /// tokio 런타임 워커 스레드에서 호출하면 패닉이 발생하므로,
    /// 일반 스레드나 `spawn_blocking` 안에서만 호출해야 합니다.
    pub fn send_line_blocking(
        &self,
        handle: &tokio::runtime::Handle,
        text: &str,
    ) -> Result<(), SupervisorError> {
        handle.block_on(self.send_line(text))
    }

    /// 프로세스가 `Running` 상태인지 반환합니다.
    pub fn is_alive(&self) -> bool {
        self.state() == ProcessState::Running
    }

    /// 실행 중인 프로세스의 PID
    pub fn get_pid(&self) -> Option<u32> {
        match self.inner.pid.load(Ordering::Acquire) {
            0 => None,
            pid => Some(pid),
        }
    }

    pub fn state(&self) -> ProcessState {
        *self.inner.state_tx.borrow()
    }

    /// 상태 변화를 구독합니다.
    pub fn subscribe_state(&self) -> watch::Receiver<ProcessState> {
        self.inner.state_tx.subscribe()
    }

    /// 현재 프로세스(또는 마지막으로 종료된 프로세스)의 최근 stderr 라인
    pub fn stderr_tail(&self) -> Vec<String> {
        self.inner.stderr_tail.snapshot()
    }

    /// 실행 중인 서버 프로세스의 CPU, 메모리, 스레드 수를 샘플링하고 gauge 로 내보냅니다.
    ///
    /// 서버가 실행 중이 아니면 None 입니다.
    pub fn performance_metrics(&self) -> Option<ProcessMetrics> {
        if !self.is_alive() {
            return None;
        }
        let sample = self.inner.sampler.sample(self.get_pid()?)?;
        process::record(&sample);
        Some(sample)
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }
}

impl LineSink for ServerSupervisor {
    fn send_line<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(async move { ServerSupervisor::send_line(self, text).await.map_err(Into::into) })
    }
}

/// 데몬 모듈 레지스트리에서 다른 모듈과 같은 생명주기로 다루기 위한 구현
impl Pipeline for ServerSupervisor {
    async fn start(&mut self) -> Result<(), WardenError> {
        ServerSupervisor::start(self).await?;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), WardenError> {
        ServerSupervisor::stop(self, false).await?;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state() {
            ProcessState::Running => HealthStatus::Healthy,
            ProcessState::Starting | ProcessState::Stopping => {
                HealthStatus::Degraded(format!("server is {}", self.state()))
            }
            ProcessState::Crashed if self.inner.config.auto_restart => {
                HealthStatus::Degraded("server crashed, restart scheduled".to_owned())
            }
            ProcessState::Crashed => HealthStatus::Unhealthy("server crashed".to_owned()),
            ProcessState::Stopped => HealthStatus::Unhealthy("server stopped".to_owned()),
        }
    }
}

impl Inner {
    async fn start_locked(self: &Arc<Self>) -> Result<u32, SupervisorError> {
        let current = *self.state_tx.borrow();
        if !current.can_start() {
            return Err(SupervisorError::AlreadyRunning {
                state: current.to_string(),
            });
        }

        self.transition(ProcessState::Starting);
        tracing::info!(
            executable = %self.config.executable,
            args = ?self.config.args,
            "starting server process"
        );

        let mut child = match self.spawn_child() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(executable = %self.config.executable, error = %e, "failed to spawn server");
                self.transition(ProcessState::Stopped);
                return Err(e);
            }
        };

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.start_kill();
            self.transition(ProcessState::Stopped);
            return Err(SupervisorError::SpawnFailed {
                executable: self.config.executable.clone(),
                reason: "child stdio pipes unavailable".to_owned(),
            });
        };

        let pid = child.id().unwrap_or(0);
        self.pid.store(pid, Ordering::Release);
        self.stderr_tail.clear();

        let readers = vec![
            tokio::spawn(read_lines(
                stdout,
                StreamKind::Stdout,
                self.line_tx.clone(),
                None,
            )),
            tokio::spawn(read_lines(
                stderr,
                StreamKind::Stderr,
                self.line_tx.clone(),
                Some(Arc::clone(&self.stderr_tail)),
            )),
        ];
        let (stdin, _writer_task) = StdinWriter::spawn(stdin);

        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let watcher = tokio::spawn(watch_process(
            Arc::downgrade(self),
            child,
            readers,
            Signals {
                kill: kill_rx,
                ready: ready_rx,
            },
            exit_tx,
        ));

        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = Some(Session {
            stdin,
            exit_rx,
            kill_tx: Some(kill_tx),
            watcher,
        });

        self.transition(ProcessState::Running);
        metrics::counter!(m::SUPERVISOR_STARTS_TOTAL).increment(1);
        metrics::gauge!(m::SUPERVISOR_SERVER_UP).set(1.0);
        self.bus
            .publish(Event::system(KIND_SERVER_STARTED).with_field(FIELD_PID, pid.to_string()));
        let _ = ready_tx.send(());
        tracing::info!(pid, "server process started");
        Ok(pid)
    }

    fn spawn_child(&self) -> Result<Child, SupervisorError> {
        let mut command = Command::new(&self.config.executable);
        command
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !self.config.working_dir.is_empty() {
            command.current_dir(&self.config.working_dir);
        }
        command.spawn().map_err(|e| SupervisorError::SpawnFailed {
            executable: self.config.executable.clone(),
            reason: e.to_string(),
        })
    }

    async fn stop_locked(&self, force: bool) -> Result<(), SupervisorError> {
        // Running -> Stopping 은 watcher 의 Running -> Crashed 와 경합하므로 조건부로 전이합니다.
        let mut from = ProcessState::Stopped;
        let entered = self.state_tx.send_if_modified(|state| {
            from = *state;
            if *state == ProcessState::Running {
                *state = ProcessState::Stopping;
                true
            } else {
                false
            }
        });
        if !entered {
            tracing::debug!(state = %from, "stop requested while server not running, nothing to do");
            return Ok(());
        }
        self.publish_transition(from, ProcessState::Stopping);

        let Some(mut session) = self.session.lock().unwrap_or_else(|e| e.into_inner()).take()
        else {
            self.transition(ProcessState::Stopped);
            return Ok(());
        };

        let pid = self.pid.load(Ordering::Acquire);
        tracing::info!(pid, force, "stopping server process");

        if force {
            if let Err(e) = terminate(pid) {
                tracing::warn!(pid, error = %e, "failed to send termination signal, killing");
                session.kill();
            }
        } else if let Err(e) = session.stdin.write_line(&self.config.stop_command).await {
            tracing::warn!(error = %e, "failed to send stop command, sending termination signal");
            if terminate(pid).is_err() {
                session.kill();
            }
        }

        let exit = match session.wait_exit(self.config.stop_grace()).await {
            Some(exit) => exit,
            None => {
                tracing::warn!(
                    pid,
                    grace_secs = self.config.stop_grace_secs,
                    "server did not exit within grace period, killing"
                );
                metrics::counter!(m::SUPERVISOR_FORCED_KILLS_TOTAL).increment(1);
                session.kill();
                match session.wait_exit(self.config.kill_wait()).await {
                    Some(exit) => exit,
                    None => {
                        tracing::error!(pid, "server did not exit after kill");
                        self.pid.store(0, Ordering::Release);
                        self.transition(ProcessState::Crashed);
                        return Err(SupervisorError::StopTimeout {
                            waited_secs: self.config.kill_wait_secs,
                        });
                    }
                }
            }
        };

        if let Err(e) = session.watcher.await {
            tracing::error!(error = %e, "health watcher task panicked");
        }

        self.pid.store(0, Ordering::Release);
        metrics::gauge!(m::SUPERVISOR_SERVER_UP).set(0.0);
        self.transition(ProcessState::Stopped);
        self.bus.publish(
            Event::system(KIND_SERVER_STOPPED).with_field(FIELD_EXIT_CODE, exit.code_string()),
        );
        tracing::info!(exit_code = ?exit.code, "server process stopped");
        Ok(())
    }

    /// 상태를 무조건 전이하고 변화가 있으면 이벤트를 발행합니다.
    fn transition(&self, to: ProcessState) {
        let from = self.state_tx.send_replace(to);
        if from != to {
            self.publish_transition(from, to);
        }
    }

    fn publish_transition(&self, from: ProcessState, to: ProcessState) {
        tracing::debug!(%from, %to, "server state changed");
        self.bus.publish(
            Event::system(KIND_SERVER_STATE_CHANGED)
                .with_field(FIELD_FROM, from.to_string())
                .with_field(FIELD_TO, to.to_string()),
        );
    }

    /// watcher 가 관찰한 프로세스 종료를 처리합니다.
    ///
    /// `Running` 중 종료만 크래시로 취급합니다. `Stopping` 중 종료는 `stop`이 처리합니다.
    fn handle_exit(self: &Arc<Self>, exit: ExitInfo) {
        let crashed = self.state_tx.send_if_modified(|state| {
            if *state == ProcessState::Running {
                *state = ProcessState::Crashed;
                true
            } else {
                false
            }
        });
        if !crashed {
            return;
        }

        self.pid.store(0, Ordering::Release);
        self.session.lock().unwrap_or_else(|e| e.into_inner()).take();
        metrics::counter!(m::SUPERVISOR_CRASHES_TOTAL).increment(1);
        metrics::gauge!(m::SUPERVISOR_SERVER_UP).set(0.0);

        let tail = self.stderr_tail.snapshot();
        tracing::error!(
            exit_code = ?exit.code,
            stderr_lines = tail.len(),
            "server process exited unexpectedly"
        );
        self.publish_transition(ProcessState::Running, ProcessState::Crashed);
        self.bus.publish(
            Event::system(KIND_SERVER_CRASHED)
                .with_priority(PRIORITY_HIGH)
                .with_field(FIELD_EXIT_CODE, exit.code_string())
                .with_field(FIELD_STDERR_TAIL, tail.join("\n")),
        );

        if self.config.auto_restart {
            schedule_restart(Arc::downgrade(self), self.config.restart_delay());
        }
    }
}

/// watcher 제어 신호
struct Signals {
    /// 강제 종료 요청
    kill: oneshot::Receiver<()>,
    /// `start`가 Running 전이를 마쳤음
    ready: oneshot::Receiver<()>,
}

/// 자식 프로세스를 소유하고 종료를 감지합니다.
///
/// 종료 보고는 `start`가 끝난 뒤에만 이루어지므로,
/// 시작 직후 종료한 프로세스도 Running -> Crashed 로 기록됩니다.
async fn watch_process(
    inner: Weak<Inner>,
    mut child: Child,
    readers: Vec<JoinHandle<u64>>,
    signals: Signals,
    exit_tx: watch::Sender<Option<ExitInfo>>,
) {
    let Signals { kill, ready } = signals;
    let status = tokio::select! {
        status = child.wait() => status,
        Ok(()) = kill => {
            if let Err(e) = child.start_kill() {
                tracing::warn!(error = %e, "failed to kill server process");
            }
            child.wait().await
        }
    };

    let exit = match status {
        Ok(status) => ExitInfo {
            code: status.code(),
        },
        Err(e) => {
            tracing::error!(error = %e, "failed to wait for server process");
            ExitInfo { code: None }
        }
    };

    // 크래시 이벤트에 마지막 stderr 가 포함되도록 reader 가 EOF 까지 읽기를 기다립니다.
    if tokio::time::timeout(READER_DRAIN_TIMEOUT, join_readers(readers))
        .await
        .is_err()
    {
        tracing::warn!("output readers did not finish after process exit");
    }

    // start 의 Running 전이 이후에 보고합니다.
    let _ = ready.await;
    let _ = exit_tx.send(Some(exit));
    if let Some(inner) = inner.upgrade() {
        inner.handle_exit(exit);
    }
}

async fn join_readers(handles: Vec<JoinHandle<u64>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "output reader task panicked");
        }
    }
}

fn schedule_restart(inner: Weak<Inner>, delay: Duration) {
    tracing::info!(delay_secs = delay.as_secs(), "scheduling automatic restart");
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let _guard = inner.lifecycle.lock().await;
        // 대기 중 누군가 직접 시작/정지했다면 건드리지 않습니다.
        if *inner.state_tx.borrow() != ProcessState::Crashed {
            return;
        }
        match inner.start_locked().await {
            Ok(pid) => tracing::info!(pid, "server restarted after crash"),
            Err(e) => tracing::error!(error = %e, "automatic restart failed"),
        }
    });
}

/// 쓰기 실패 직후 프로세스 종료 여부를 짧게 확인합니다.
async fn probe_exit(mut exit_rx: watch::Receiver<Option<ExitInfo>>) {
    let exited = tokio::time::timeout(WRITE_FAILURE_PROBE, exit_rx.wait_for(Option::is_some))
        .await
        .is_ok_and(|r| r.is_ok());
    if exited {
        tracing::warn!("server exited after stdin write failure");
    } else {
        tracing::warn!("stdin write failed but server process is still alive");
    }
}

/// 프로세스에 SIGTERM 을 보냅니다.
#[cfg(unix)]
fn terminate(pid: u32) -> std::io::Result<()> {
    if pid == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no pid for server process",
        ));
    }
    // SAFETY: kill(2) 는 메모리에 접근하지 않으며, pid 는 자식 프로세스의 것입니다.
    let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn terminate(_pid: u32) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "termination signal not supported on this platform",
    ))
}
