//! 도메인 타입 — 모듈 간 공유되는 기본 타입 정의

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// 자식 프로세스 출력 스트림 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// 서버가 출력한 한 줄
///
/// 줄 끝 문자(`\n`, `\r\n`)는 제거된 상태입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    /// 출처 스트림
    pub stream: StreamKind,
    /// 라인 텍스트 (UTF-8, 잘못된 바이트는 U+FFFD 로 치환)
    pub text: String,
    /// 수신 시각
    pub received_at: SystemTime,
}

impl OutputLine {
    /// 현재 시각으로 라인을 생성합니다.
    pub fn new(stream: StreamKind, text: impl Into<String>) -> Self {
        Self {
            stream,
            text: text.into(),
            received_at: SystemTime::now(),
        }
    }

    /// stdout 라인을 생성합니다.
    pub fn stdout(text: impl Into<String>) -> Self {
        Self::new(StreamKind::Stdout, text)
    }

    /// stderr 라인을 생성합니다.
    pub fn stderr(text: impl Into<String>) -> Self {
        Self::new(StreamKind::Stderr, text)
    }
}

/// 감독 대상 서버의 프로세스 상태
///
/// ```text
/// Stopped ──start──▶ Starting ──spawned──▶ Running ──stop──▶ Stopping ──▶ Stopped
///    ▲                   │                    │
///    └──spawn failed─────┘                    └──unexpected exit──▶ Crashed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Crashed,
}

impl ProcessState {
    /// `start()` 호출이 허용되는 상태인지 반환합니다.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Stopped | Self::Crashed)
    }

    /// 프로세스가 떠 있지 않은(종료된) 상태인지 반환합니다.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Crashed)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Crashed => "crashed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_terminal_states_can_start() {
        assert!(ProcessState::Stopped.can_start());
        assert!(ProcessState::Crashed.can_start());
        assert!(!ProcessState::Starting.can_start());
        assert!(!ProcessState::Running.can_start());
        assert!(!ProcessState::Stopping.can_start());
    }

    #[test]
    fn process_state_display_is_lowercase() {
        assert_eq!(ProcessState::Running.to_string(), "running");
        assert_eq!(ProcessState::Crashed.to_string(), "crashed");
    }

    #[test]
    fn output_line_constructors_set_stream() {
        assert_eq!(OutputLine::stdout("a").stream, StreamKind::Stdout);
        assert_eq!(OutputLine::stderr("b").stream, StreamKind::Stderr);
        assert_eq!(StreamKind::Stderr.to_string(), "stderr");
    }

    #[test]
    fn process_state_serializes_lowercase() {
        let json = serde_json::to_string(&ProcessState::Stopping).unwrap();
        assert_eq!(json, "\"stopping\"");
    }
}
