//! 수퍼바이저 에러 타입
//!
//! [`SupervisorError`]는 서버 프로세스 생명주기 연산의 실패를 표현합니다.
//! 생명주기 에러는 `start`/`stop`/`restart` 호출자에게 동기적으로 반환됩니다.

use warden_core::error::WardenError;
use warden_core::pipeline::SinkError;

/// 수퍼바이저 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// 이미 실행 중 (Stopped/Crashed 가 아닌 상태에서 start)
    #[error("server is already running (state: {state})")]
    AlreadyRunning { state: String },

    /// 실행 중이 아님 (Running 이 아닌 상태에서 send_line)
    #[error("server is not running (state: {state})")]
    NotRunning { state: String },

    /// stdin 쓰기 실패
    #[error("failed to write to server stdin: {0}")]
    WriteError(String),

    /// 프로세스 생성 실패
    #[error("failed to spawn '{executable}': {reason}")]
    SpawnFailed { executable: String, reason: String },

    /// 강제 종료 후에도 프로세스가 회수되지 않음
    #[error("server did not exit within {waited_secs}s after kill")]
    StopTimeout { waited_secs: u64 },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },
}

impl From<SupervisorError> for WardenError {
    fn from(err: SupervisorError) -> Self {
        WardenError::Supervisor(err.to_string())
    }
}

impl From<SupervisorError> for SinkError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::NotRunning { state } => SinkError::NotRunning { state },
            other => SinkError::Write(other.to_string()),
        }
    }
}
