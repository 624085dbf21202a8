//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 에러를 표현합니다.
//! `From<LogPipelineError> for WardenError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 규칙 패턴 컴파일 실패는 에러로 전파되지 않고
//! [`RuleCompileError`](crate::rule::RuleCompileError) 값으로 수집됩니다.

use warden_core::error::WardenError;

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 규칙 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 파이프라인 상태 에러 (이미 실행 중, 실행 중 아님 등)
    #[error("pipeline is {state}, cannot {action}")]
    InvalidState {
        state: &'static str,
        action: &'static str,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LogPipelineError> for WardenError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Io(e) => WardenError::Io(e),
            other => WardenError::Pipeline(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_load_error_display() {
        let err = LogPipelineError::RuleLoad {
            path: "/etc/warden/rules/minecraft.yml".to_owned(),
            reason: "invalid YAML".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("minecraft.yml"));
        assert!(msg.contains("invalid YAML"));
    }

    #[test]
    fn invalid_state_display() {
        let err = LogPipelineError::InvalidState {
            state: "running",
            action: "start",
        };
        assert_eq!(err.to_string(), "pipeline is running, cannot start");
    }

    #[test]
    fn converts_into_warden_error() {
        let err: WardenError = LogPipelineError::Channel("closed".to_owned()).into();
        assert!(matches!(err, WardenError::Pipeline(_)));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: WardenError = LogPipelineError::Io(io).into();
        assert!(matches!(err, WardenError::Io(_)));
    }
}
