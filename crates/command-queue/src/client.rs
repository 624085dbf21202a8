//! 호출자 측 큐 클라이언트
//!
//! 수퍼바이저와 다른 OS 프로세스(CLI 등)에서 명령을 넣고 결과를 기다립니다.
//! 클라이언트는 엔트리를 생성하고 읽기만 하며, 생성 이후의 엔트리는 수정하지 않습니다.
//! 결과 확인은 별도의 ack 마커 파일로 표시합니다.

use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::command::{Command, CommandStatus};
use crate::config::CommandQueueConfig;
use crate::error::QueueError;
use crate::store::{QueueStore, blocking};

/// `wait_for_completion` 결과
///
/// 각 변형은 마지막으로 관찰한 엔트리 스냅샷을 담습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// 출력이 수집되어 완료됨
    Completed(Command),
    /// 전송 또는 처리 실패
    Failed(Command),
    /// 서버 응답이 없었거나(엔트리가 TimedOut), 호출자의 대기 시간이 먼저 끝남
    TimedOut(Command),
}

impl CommandOutcome {
    fn from_terminal(command: Command) -> Self {
        match command.status {
            CommandStatus::Completed => Self::Completed(command),
            CommandStatus::Failed => Self::Failed(command),
            _ => Self::TimedOut(command),
        }
    }

    pub fn command(&self) -> &Command {
        match self {
            Self::Completed(c) | Self::Failed(c) | Self::TimedOut(c) => c,
        }
    }

    pub fn status_name(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
            Self::TimedOut(_) => "timed_out",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// 수집된 출력
    pub fn result(&self) -> Option<&str> {
        self.command().result.as_deref()
    }
}

/// 큐 클라이언트
#[derive(Clone)]
pub struct QueueClient {
    store: QueueStore,
    poll_interval: Duration,
}

impl QueueClient {
    pub fn new(store: QueueStore, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
        }
    }

    /// 설정의 큐 디렉토리를 엽니다.
    pub fn from_config(config: &CommandQueueConfig) -> Result<Self, QueueError> {
        config.validate()?;
        Ok(Self::new(
            QueueStore::open(&config.dir)?,
            config.poll_interval(),
        ))
    }

    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    /// 명령을 큐에 넣고 ID 를 즉시 반환합니다.
    pub async fn enqueue(&self, text: &str) -> Result<Uuid, QueueError> {
        self.enqueue_with_priority(text, 0).await
    }

    /// 우선순위를 지정해 명령을 큐에 넣습니다. 높을수록 먼저 전송됩니다.
    pub async fn enqueue_with_priority(
        &self,
        text: &str,
        priority: i32,
    ) -> Result<Uuid, QueueError> {
        Command::validate_text(text)?;
        let command = Command::new(text.trim()).with_priority(priority);
        let id = command.id;
        let store = self.store.clone();
        blocking(move || store.insert(&command)).await?;
        Ok(id)
    }

    /// 엔트리가 종료 상태가 되거나 `timeout`이 지날 때까지 기다립니다.
    ///
    /// 대기 시간이 먼저 끝나면 엔트리를 건드리지 않고
    /// 마지막 스냅샷으로 [`CommandOutcome::TimedOut`]을 반환합니다.
    pub async fn wait_for_completion(
        &self,
        id: Uuid,
        timeout: Duration,
    ) -> Result<CommandOutcome, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let store = self.store.clone();
            let command = blocking(move || store.load(id)).await?;
            if command.status.is_terminal() {
                return Ok(CommandOutcome::from_terminal(command));
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                tracing::debug!(%id, status = %command.status, "wait for completion timed out");
                return Ok(CommandOutcome::TimedOut(command));
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// 런타임이 없는 호출자를 위한 `wait_for_completion`입니다.
    pub fn wait_for_completion_blocking(
        &self,
        id: Uuid,
        timeout: Duration,
    ) -> Result<CommandOutcome, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            let command = self.store.load(id)?;
            if command.status.is_terminal() {
                return Ok(CommandOutcome::from_terminal(command));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(CommandOutcome::TimedOut(command));
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    /// 결과를 확인했음을 표시합니다. 확인된 종료 엔트리는 다음 GC 에서 삭제됩니다.
    pub async fn acknowledge(&self, id: Uuid) -> Result<(), QueueError> {
        let store = self.store.clone();
        blocking(move || store.acknowledge(id)).await
    }
}
