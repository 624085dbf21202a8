//! 커맨드 큐 설정
//!
//! [`CommandQueueConfig`]는 core의 [`QueueConfig`](warden_core::config::QueueConfig)를
//! 기반으로 디스패처, 상관 분석기, 클라이언트가 쓰는 설정을 제공합니다.

use std::path::{Component, Path};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::correlator::CorrelationSettings;
use crate::error::QueueError;

/// `{command}` 자리표시자
pub const ECHO_PLACEHOLDER: &str = "{command}";

/// 커맨드 큐 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandQueueConfig {
    /// 큐 디렉토리
    pub dir: String,
    /// 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 출력 종료 판단 quiet period (밀리초)
    pub quiet_period_ms: u64,
    /// 첫 출력 대기 시간 (밀리초)
    pub response_timeout_ms: u64,
    /// 클라이언트 기본 대기 시간 (초)
    pub command_timeout_secs: u64,
    /// 종료 엔트리 보존 기간 (초)
    pub retention_secs: u64,
    /// 명령 에코 패턴 (빈 문자열이면 비활성)
    pub echo_pattern: String,
}

impl Default for CommandQueueConfig {
    fn default() -> Self {
        Self::from_core(&warden_core::config::QueueConfig::default())
    }
}

impl CommandQueueConfig {
    /// core의 `QueueConfig`에서 큐 설정을 생성합니다.
    pub fn from_core(core: &warden_core::config::QueueConfig) -> Self {
        Self {
            dir: core.dir.clone(),
            poll_interval_ms: core.poll_interval_ms,
            quiet_period_ms: core.quiet_period_ms,
            response_timeout_ms: core.response_timeout_ms,
            command_timeout_secs: core.command_timeout_secs,
            retention_secs: core.retention_secs,
            echo_pattern: core.echo_pattern.clone(),
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.dir.trim().is_empty() {
            return Err(invalid("dir", "must not be empty"));
        }
        if Path::new(&self.dir)
            .components()
            .any(|c| c == Component::ParentDir)
        {
            return Err(invalid(
                "dir",
                &format!("queue dir '{}' contains path traversal pattern '..'", self.dir),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "must be greater than 0"));
        }
        if self.quiet_period_ms == 0 {
            return Err(invalid("quiet_period_ms", "must be greater than 0"));
        }
        if self.response_timeout_ms < self.quiet_period_ms {
            return Err(invalid(
                "response_timeout_ms",
                "must be greater than or equal to quiet_period_ms",
            ));
        }
        if !self.echo_pattern.is_empty() && !self.echo_pattern.contains(ECHO_PLACEHOLDER) {
            return Err(invalid(
                "echo_pattern",
                &format!("must contain the {ECHO_PLACEHOLDER} placeholder"),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// 상관 분석 설정
    pub fn correlation(&self) -> CorrelationSettings {
        CorrelationSettings {
            quiet_period: Duration::from_millis(self.quiet_period_ms),
            response_timeout: Duration::from_millis(self.response_timeout_ms),
            echo_pattern: (!self.echo_pattern.is_empty()).then(|| self.echo_pattern.clone()),
        }
    }
}

fn invalid(field: &str, reason: &str) -> QueueError {
    QueueError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CommandQueueConfig::default();
        config.validate().unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(200));
        assert!(config.correlation().echo_pattern.is_none());
    }

    #[test]
    fn response_timeout_shorter_than_quiet_period_is_rejected() {
        let config = CommandQueueConfig {
            quiet_period_ms: 1000,
            response_timeout_ms: 500,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("response_timeout_ms"));
    }

    #[test]
    fn echo_pattern_requires_placeholder() {
        let mut config = CommandQueueConfig {
            echo_pattern: "issued server command".to_owned(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.echo_pattern = "issued server command: /{command}".to_owned();
        config.validate().unwrap();
        assert_eq!(
            config.correlation().echo_pattern.as_deref(),
            Some("issued server command: /{command}")
        );
    }

    #[test]
    fn queue_dir_traversal_is_rejected() {
        let config = CommandQueueConfig {
            dir: "/var/lib/warden/../../etc".to_owned(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
