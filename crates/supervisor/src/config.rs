//! 수퍼바이저 설정
//!
//! [`SupervisorConfig`]는 core의 [`ServerConfig`](warden_core::config::ServerConfig)를
//! 기반으로 수퍼바이저 전용 설정을 제공합니다.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SupervisorError;

/// 수퍼바이저 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// 실행 파일 경로
    pub executable: String,
    /// 실행 인자
    pub args: Vec<String>,
    /// 작업 디렉토리 (빈 문자열이면 현재 디렉토리)
    pub working_dir: String,
    /// graceful 종료 명령
    pub stop_command: String,
    /// graceful 종료 대기 시간 (초)
    pub stop_grace_secs: u64,
    /// 강제 종료 후 회수 대기 시간 (초)
    pub kill_wait_secs: u64,
    /// 크래시 후 자동 재시작
    pub auto_restart: bool,
    /// 자동 재시작 지연 (초)
    pub restart_delay_secs: u64,
    /// 보관할 stderr 라인 수
    pub stderr_tail_lines: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::from_core(&warden_core::config::ServerConfig::default())
    }
}

impl SupervisorConfig {
    /// core의 `ServerConfig`에서 수퍼바이저 설정을 생성합니다.
    pub fn from_core(core: &warden_core::config::ServerConfig) -> Self {
        Self {
            executable: core.executable.clone(),
            args: core.args.clone(),
            working_dir: core.working_dir.clone(),
            stop_command: core.stop_command.clone(),
            stop_grace_secs: core.stop_grace_secs,
            kill_wait_secs: core.kill_wait_secs,
            auto_restart: core.auto_restart,
            restart_delay_secs: core.restart_delay_secs,
            stderr_tail_lines: core.stderr_tail_lines,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), SupervisorError> {
        if self.executable.trim().is_empty() {
            return Err(invalid("executable", "must not be empty"));
        }
        if self.stop_grace_secs == 0 {
            return Err(invalid("stop_grace_secs", "must be greater than 0"));
        }
        if self.stderr_tail_lines == 0 {
            return Err(invalid("stderr_tail_lines", "must be greater than 0"));
        }
        if self.stop_command.contains('\n') {
            return Err(invalid("stop_command", "must be a single line"));
        }
        Ok(())
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub fn kill_wait(&self) -> Duration {
        Duration::from_secs(self.kill_wait_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }
}

fn invalid(field: &str, reason: &str) -> SupervisorError {
    SupervisorError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

/// 수퍼바이저 설정 빌더
#[derive(Default)]
pub struct SupervisorConfigBuilder {
    config: SupervisorConfig,
}

impl SupervisorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 실행 파일과 인자를 설정합니다.
    pub fn command(mut self, executable: impl Into<String>, args: &[&str]) -> Self {
        self.config.executable = executable.into();
        self.config.args = args.iter().map(|a| (*a).to_owned()).collect();
        self
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.working_dir = dir.into();
        self
    }

    pub fn stop_command(mut self, command: impl Into<String>) -> Self {
        self.config.stop_command = command.into();
        self
    }

    pub fn stop_grace_secs(mut self, secs: u64) -> Self {
        self.config.stop_grace_secs = secs;
        self
    }

    pub fn kill_wait_secs(mut self, secs: u64) -> Self {
        self.config.kill_wait_secs = secs;
        self
    }

    /// 크래시 후 자동 재시작을 설정합니다.
    pub fn auto_restart(mut self, enabled: bool, delay_secs: u64) -> Self {
        self.config.auto_restart = enabled;
        self.config.restart_delay_secs = delay_secs;
        self
    }

    pub fn stderr_tail_lines(mut self, lines: usize) -> Self {
        self.config.stderr_tail_lines = lines;
        self
    }

    /// 설정을 검증하고 반환합니다.
    pub fn build(self) -> Result<SupervisorConfig, SupervisorError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
