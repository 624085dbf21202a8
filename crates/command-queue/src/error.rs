//! 커맨드 큐 에러 타입
//!
//! 손상된 엔트리([`QueueError::QueueCorruption`])는 목록 조회 시 경고와 함께 건너뛰며,
//! 단일 엔트리 조회(`load`)에서만 에러로 반환됩니다.

use std::path::PathBuf;

use uuid::Uuid;
use warden_core::error::WardenError;

use crate::command::CommandStatus;

/// 커맨드 큐 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// 디스크의 엔트리를 해석할 수 없음
    #[error("corrupt queue entry {}: {reason}", path.display())]
    QueueCorruption { path: PathBuf, reason: String },

    /// 엔트리 없음
    #[error("command {0} not found in queue")]
    NotFound(Uuid),

    /// compare-and-swap 실패 (다른 writer 가 먼저 갱신함)
    #[error("command {id} was modified concurrently (expected revision {expected}, found {actual})")]
    Conflict { id: Uuid, expected: u64, actual: u64 },

    /// 허용되지 않는 상태 전이
    #[error("command {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: CommandStatus,
        to: CommandStatus,
    },

    /// 큐에 넣을 수 없는 명령
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },

    /// 디스패처 상태 에러
    #[error("dispatcher is {state}, cannot {action}")]
    InvalidState {
        state: &'static str,
        action: &'static str,
    },

    /// 직렬화 실패
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<QueueError> for WardenError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Io(e) => WardenError::Io(e),
            other => WardenError::Queue(other.to_string()),
        }
    }
}
