//! 수퍼바이저 측 디스패처 — 큐를 폴링해 명령을 전송하고 결과를 기록합니다.
//!
//! [`CommandDispatcher`]는 core의 [`Pipeline`] trait을 구현하여
//! `warden-daemon`에서 다른 모듈과 동일한 생명주기로 관리됩니다.
//!
//! # 명령 하나의 처리 순서
//! ```text
//! Pending ─ subscribe(lines) ─ send_line ─┬─ Err ──▶ Failed
//!                                         └─ Ok ───▶ Sent ─▶ AwaitingOutput
//!                                                      ─ correlate ─▶ Completed | TimedOut
//! ```
//!
//! 출력 귀속이 섞이지 않도록 명령은 한 번에 하나씩 처리합니다.
//! 엔트리 상태를 갱신하는 것은 이 디스패처뿐입니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use warden_core::bus::EventBus;
use warden_core::error::WardenError;
use warden_core::event::{
    Event, FIELD_COMMAND_ID, FIELD_ERROR, FIELD_RESULT, FIELD_STATUS, KIND_COMMAND_COMPLETED,
};
use warden_core::metrics as m;
use warden_core::pipeline::{HealthStatus, LineSink, Pipeline};
use warden_log_pipeline::LogParser;

use crate::command::{Command, CommandStatus};
use crate::config::CommandQueueConfig;
use crate::correlator::{Correlation, Correlator};
use crate::error::QueueError;
use crate::store::{QueueStore, blocking};

/// 가비지 컬렉션 주기
const GC_INTERVAL: Duration = Duration::from_secs(30);

/// 디스패처 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatcherState {
    Initialized,
    Running,
    Stopped,
}

impl DispatcherState {
    fn name(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

struct DispatchContext {
    store: QueueStore,
    sink: Arc<dyn LineSink>,
    parser: Arc<LogParser>,
    bus: Arc<EventBus>,
    correlator: Correlator,
    poll_interval: Duration,
    retention: Duration,
    processed: AtomicU64,
    /// 디스크에 Pending 으로 남았지만 다시 보내면 안 되는 명령과 기록할 오류
    stranded: Mutex<HashMap<Uuid, String>>,
}

/// 명령 하나를 처리한 뒤 같은 틱에서 계속 진행할지 여부
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Backoff,
}

/// 커맨드 디스패처
///
/// # 사용 예시
/// ```ignore
/// let mut dispatcher = CommandDispatcherBuilder::new()
///     .config(CommandQueueConfig::from_core(&config.queue))
///     .sink(Arc::new(supervisor.clone()))
///     .parser(log_pipeline.parser())
///     .bus(bus)
///     .build()?;
/// dispatcher.start().await?;
/// ```
pub struct CommandDispatcher {
    state: DispatcherState,
    ctx: Arc<DispatchContext>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CommandDispatcher {
    pub fn state_name(&self) -> &str {
        self.state.name()
    }

    /// 종료 상태까지 처리한 명령 수
    pub fn processed_count(&self) -> u64 {
        self.ctx.processed.load(Ordering::Relaxed)
    }

    pub fn store(&self) -> &QueueStore {
        &self.ctx.store
    }
}

impl Pipeline for CommandDispatcher {
    async fn start(&mut self) -> Result<(), WardenError> {
        if self.state == DispatcherState::Running {
            return Err(QueueError::InvalidState {
                state: self.state.name(),
                action: "start",
            }
            .into());
        }

        tracing::info!(
            dir = %self.ctx.store.dir().display(),
            poll_ms = self.ctx.poll_interval.as_millis() as u64,
            "starting command dispatcher"
        );

        self.cancel = CancellationToken::new();
        let ctx = Arc::clone(&self.ctx);
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(async move { ctx.run(cancel).await }));
        self.state = DispatcherState::Running;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), WardenError> {
        if self.state != DispatcherState::Running {
            return Err(QueueError::InvalidState {
                state: self.state.name(),
                action: "stop",
            }
            .into());
        }

        tracing::info!("stopping command dispatcher");
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "command dispatcher task panicked");
            }
        }
        self.state = DispatcherState::Stopped;
        tracing::info!(processed = self.processed_count(), "command dispatcher stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            DispatcherState::Running => {
                if self.task.as_ref().is_some_and(JoinHandle::is_finished) {
                    HealthStatus::Unhealthy("dispatcher task exited".to_owned())
                } else {
                    HealthStatus::Healthy
                }
            }
            DispatcherState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            DispatcherState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

impl DispatchContext {
    async fn run(&self, cancel: CancellationToken) {
        self.recover_in_flight().await;

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_gc: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            self.drain_pending(&cancel).await;

            if last_gc.is_none_or(|at| at.elapsed() >= GC_INTERVAL) {
                self.collect_garbage().await;
                last_gc = Some(Instant::now());
            }
        }
    }

    /// 이전 실행에서 전송 후 결과를 기록하지 못한 엔트리를 Failed 로 정리합니다.
    async fn recover_in_flight(&self) {
        let store = self.store.clone();
        let entries = match blocking(move || store.list()).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "failed to scan queue for in-flight commands");
                return;
            }
        };

        for command in entries.into_iter().filter(|c| {
            matches!(
                c.status,
                CommandStatus::Sent | CommandStatus::AwaitingOutput
            )
        }) {
            tracing::warn!(id = %command.id, status = %command.status, "abandoning in-flight command from previous run");
            if let Some(stored) = self
                .transition(&command, CommandStatus::Failed, |c| {
                    c.with_error("dispatcher restarted before output was collected")
                })
                .await
            {
                self.finish(&stored);
            }
        }
    }

    /// Pending 이 없을 때까지 가장 앞선 명령을 하나씩 처리합니다.
    ///
    /// 매번 목록을 다시 읽으므로 처리 중 들어온 높은 우선순위 명령이 먼저 나갑니다.
    /// 상태 저장에 실패하면 다음 틱까지 쉽니다.
    async fn drain_pending(&self, cancel: &CancellationToken) {
        while !cancel.is_cancelled() {
            let store = self.store.clone();
            let next = match blocking(move || store.pending()).await {
                Ok(pending) => pending.into_iter().next(),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read pending commands");
                    return;
                }
            };
            let Some(command) = next else {
                return;
            };

            let flow = match self.stranded_reason(command.id) {
                Some(reason) => self.fail_stranded(&command, reason).await,
                None => self.dispatch(command, cancel).await,
            };
            if flow == Flow::Backoff {
                return;
            }
        }
    }

    fn stranded_reason(&self, id: Uuid) -> Option<String> {
        self.stranded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    fn set_stranded(&self, id: Uuid, reason: Option<String>) {
        let mut stranded = self
            .stranded
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        match reason {
            Some(reason) => {
                stranded.insert(id, reason);
            }
            None => {
                stranded.remove(&id);
            }
        }
    }

    /// 이미 전송했거나 실패 기록이 밀린 명령은 재전송 없이 Failed 기록만 다시 시도합니다.
    async fn fail_stranded(&self, command: &Command, reason: String) -> Flow {
        match self
            .transition(command, CommandStatus::Failed, |c| c.with_error(reason))
            .await
        {
            Some(stored) => {
                self.set_stranded(command.id, None);
                self.finish(&stored);
                Flow::Continue
            }
            None => Flow::Backoff,
        }
    }

    async fn dispatch(&self, command: Command, cancel: &CancellationToken) -> Flow {
        // 전송 직후의 출력을 놓치지 않도록 먼저 구독합니다.
        let mut lines = self.parser.subscribe();
        tracing::info!(id = %command.id, text = %command.text, "dispatching queued command");

        if let Err(e) = self.sink.send_line(&command.text).await {
            tracing::warn!(id = %command.id, error = %e, "failed to deliver command");
            let error = e.to_string();
            return match self
                .transition(&command, CommandStatus::Failed, |c| c.with_error(error.clone()))
                .await
            {
                Some(stored) => {
                    self.finish(&stored);
                    Flow::Continue
                }
                None => {
                    self.set_stranded(command.id, Some(error));
                    Flow::Backoff
                }
            };
        }

        // stdin 에 이미 쓴 명령은 Sent 기록에 실패해도 다시 보내지 않습니다.
        let Some(sent) = self.transition(&command, CommandStatus::Sent, |c| c).await else {
            self.set_stranded(
                command.id,
                Some("command was delivered but its state could not be recorded".to_owned()),
            );
            return Flow::Backoff;
        };
        // Sent 이후의 엔트리는 pending 목록에 다시 나타나지 않고 재시작 시 정리됩니다.
        let Some(awaiting) = self
            .transition(&sent, CommandStatus::AwaitingOutput, |c| c)
            .await
        else {
            return Flow::Backoff;
        };

        let correlation = tokio::select! {
            correlation = self.correlator.collect(&mut lines, &command.text) => correlation,
            _ = cancel.cancelled() => {
                if let Some(stored) = self
                    .transition(&awaiting, CommandStatus::Failed, |c| {
                        c.with_error("dispatcher stopped before output was collected")
                    })
                    .await
                {
                    self.finish(&stored);
                }
                return Flow::Backoff;
            }
        };

        let stored = match correlation {
            Correlation::Output(output) => {
                let result = output.join("\n");
                self.transition(&awaiting, CommandStatus::Completed, |c| c.with_result(result))
                    .await
            }
            Correlation::NoOutput => {
                self.transition(&awaiting, CommandStatus::TimedOut, |c| c).await
            }
        };
        match stored {
            Some(stored) => {
                self.finish(&stored);
                Flow::Continue
            }
            None => Flow::Backoff,
        }
    }

    /// 상태를 전이하고 저장합니다. 실패하면 경고를 남기고 None 을 반환합니다.
    async fn transition<F>(
        &self,
        current: &Command,
        next: CommandStatus,
        decorate: F,
    ) -> Option<Command>
    where
        F: FnOnce(Command) -> Command + Send,
    {
        let updated = match current.advance(next) {
            Ok(updated) => decorate(updated),
            Err(e) => {
                tracing::warn!(id = %current.id, error = %e, "rejected command state change");
                return None;
            }
        };

        let store = self.store.clone();
        let (id, revision) = (current.id, current.revision);
        match blocking(move || store.compare_and_swap(id, revision, updated)).await {
            Ok(stored) => Some(stored),
            Err(e) => {
                tracing::warn!(%id, to = %next, error = %e, "failed to persist command state");
                None
            }
        }
    }

    fn finish(&self, command: &Command) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            m::QUEUE_COMMANDS_PROCESSED_TOTAL,
            m::LABEL_STATUS => command.status.as_str()
        )
        .increment(1);

        let mut event = Event::system(KIND_COMMAND_COMPLETED)
            .with_field(FIELD_COMMAND_ID, command.id.to_string())
            .with_field(FIELD_STATUS, command.status.as_str());
        if let Some(result) = &command.result {
            event = event.with_field(FIELD_RESULT, result.clone());
        }
        if let Some(error) = &command.error {
            event = event.with_field(FIELD_ERROR, error.clone());
        }
        self.bus.publish(event);

        tracing::info!(id = %command.id, status = %command.status, "command finished");
    }

    async fn collect_garbage(&self) {
        let store = self.store.clone();
        let retention = self.retention;
        if let Err(e) = blocking(move || store.collect_garbage(retention)).await {
            tracing::warn!(error = %e, "queue garbage collection failed");
        }
    }
}

/// 디스패처 빌더
pub struct CommandDispatcherBuilder {
    config: CommandQueueConfig,
    store: Option<QueueStore>,
    sink: Option<Arc<dyn LineSink>>,
    parser: Option<Arc<LogParser>>,
    bus: Option<Arc<EventBus>>,
}

impl CommandDispatcherBuilder {
    pub fn new() -> Self {
        Self {
            config: CommandQueueConfig::default(),
            store: None,
            sink: None,
            parser: None,
            bus: None,
        }
    }

    pub fn config(mut self, config: CommandQueueConfig) -> Self {
        self.config = config;
        self
    }

    /// 저장소를 지정합니다. 지정하지 않으면 설정의 디렉토리를 엽니다.
    pub fn store(mut self, store: QueueStore) -> Self {
        self.store = Some(store);
        self
    }

    /// 명령을 전달할 대상 (보통 수퍼바이저)
    pub fn sink(mut self, sink: Arc<dyn LineSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 출력 라인을 구독할 파서
    pub fn parser(mut self, parser: Arc<LogParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// 이벤트 버스를 지정합니다. 지정하지 않으면 파서의 버스를 사용합니다.
    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn build(self) -> Result<CommandDispatcher, QueueError> {
        self.config.validate()?;

        let sink = self.sink.ok_or_else(|| QueueError::Config {
            field: "sink".to_owned(),
            reason: "line sink is required".to_owned(),
        })?;
        let parser = self.parser.ok_or_else(|| QueueError::Config {
            field: "parser".to_owned(),
            reason: "log parser is required".to_owned(),
        })?;
        let store = match self.store {
            Some(store) => store,
            None => QueueStore::open(&self.config.dir)?,
        };
        let bus = self.bus.unwrap_or_else(|| Arc::clone(parser.bus()));

        Ok(CommandDispatcher {
            state: DispatcherState::Initialized,
            ctx: Arc::new(DispatchContext {
                store,
                sink,
                parser,
                bus,
                correlator: Correlator::new(self.config.correlation()),
                poll_interval: self.config.poll_interval(),
                retention: self.config.retention(),
                processed: AtomicU64::new(0),
                stranded: Mutex::new(HashMap::new()),
            }),
            cancel: CancellationToken::new(),
            task: None,
        })
    }
}

impl Default for CommandDispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
