//! 커맨드 모델 — 큐 엔트리 하나의 직렬화 형태
//!
//! ```text
//! Pending ──▶ Sent ──▶ AwaitingOutput ──▶ Completed
//!    │          │              ├──────────▶ TimedOut
//!    └──────────┴──────────────┴──────────▶ Failed
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QueueError;

/// 커맨드 처리 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// 큐에 들어왔고 아직 전송되지 않음
    Pending,
    /// 서버 stdin 으로 전송됨
    Sent,
    /// 출력 상관 분석 중
    AwaitingOutput,
    /// 출력이 수집됨
    Completed,
    /// 응답 대기 시간 안에 출력이 없음
    TimedOut,
    /// 전송 또는 처리 실패
    Failed,
}

impl CommandStatus {
    /// 더 이상 전이하지 않는 상태인지 반환합니다.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Failed)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use CommandStatus::*;
        matches!(
            (self, next),
            (Pending, Sent)
                | (Pending, Failed)
                | (Sent, AwaitingOutput)
                | (Sent, Failed)
                | (AwaitingOutput, Completed)
                | (AwaitingOutput, TimedOut)
                | (AwaitingOutput, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::AwaitingOutput => "awaiting_output",
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 큐에 들어간 서버 명령
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// 큐 전체에서 유일한 ID
    pub id: Uuid,
    /// 서버 stdin 으로 보낼 한 줄
    pub text: String,
    pub status: CommandStatus,
    /// 높을수록 먼저 전송 (같으면 FIFO)
    #[serde(default)]
    pub priority: i32,
    /// 요청한 프로세스의 PID
    pub owner_pid: u32,
    /// 갱신할 때마다 1씩 증가 (compare-and-swap 기준)
    #[serde(default)]
    pub revision: u64,
    pub issued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// 수집된 출력 (줄바꿈으로 연결)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// 실패 사유
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Command {
    /// 현재 프로세스 소유의 Pending 명령을 생성합니다.
    pub fn new(text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            status: CommandStatus::Pending,
            priority: 0,
            owner_pid: std::process::id(),
            revision: 0,
            issued_at: now,
            updated_at: now,
            sent_at: None,
            finished_at: None,
            result: None,
            error: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 큐에 넣을 수 있는 텍스트인지 검사합니다.
    pub fn validate_text(text: &str) -> Result<(), QueueError> {
        if text.trim().is_empty() {
            return Err(QueueError::InvalidCommand(
                "command text must not be empty".to_owned(),
            ));
        }
        if text.contains(['\n', '\r']) {
            return Err(QueueError::InvalidCommand(
                "command text must be a single line".to_owned(),
            ));
        }
        Ok(())
    }

    /// `next` 상태로 전이한 복사본을 반환합니다. 리비전은 저장소가 올립니다.
    pub fn advance(&self, next: CommandStatus) -> Result<Self, QueueError> {
        if !self.status.can_transition_to(next) {
            return Err(QueueError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        let mut updated = self.clone();
        updated.status = next;
        updated.updated_at = now;
        if next == CommandStatus::Sent {
            updated.sent_at = Some(now);
        }
        if next.is_terminal() {
            updated.finished_at = Some(now);
        }
        Ok(updated)
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// 종료 상태 이후 경과 시간. 아직 종료되지 않았으면 None.
    pub fn finished_for(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.finished_at
            .filter(|_| self.status.is_terminal())
            .map(|at| now - at)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.id, self.status, self.text)
    }
}
