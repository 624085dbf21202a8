//! 설정 관리 — warden.toml 파싱 및 런타임 설정
//!
//! [`WardenConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`WARDEN_SERVER_EXECUTABLE=/opt/mc/run.sh` 형식)
//! 3. 설정 파일 (`warden.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), warden_core::error::WardenError> {
//! use warden_core::config::WardenConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = WardenConfig::load("warden.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = WardenConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, WardenError};

/// Warden 통합 설정
///
/// `warden.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 감독 대상 서버 프로세스 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 로그 파이프라인 설정
    #[serde(default)]
    pub log_pipeline: LogPipelineConfig,
    /// 커맨드 큐 설정
    #[serde(default)]
    pub queue: QueueConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl WardenConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, WardenError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 및 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, WardenError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WardenError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                WardenError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, WardenError> {
        toml::from_str(toml_str).map_err(|e| {
            WardenError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `WARDEN_{SECTION}_{FIELD}`
    /// 예: `WARDEN_QUEUE_POLL_INTERVAL_MS=100`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "WARDEN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "WARDEN_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "WARDEN_GENERAL_DATA_DIR");
        override_string(&mut self.general.pid_file, "WARDEN_GENERAL_PID_FILE");

        // Server
        override_string(&mut self.server.executable, "WARDEN_SERVER_EXECUTABLE");
        override_csv(&mut self.server.args, "WARDEN_SERVER_ARGS");
        override_string(&mut self.server.working_dir, "WARDEN_SERVER_WORKING_DIR");
        override_string(&mut self.server.stop_command, "WARDEN_SERVER_STOP_COMMAND");
        override_u64(
            &mut self.server.stop_grace_secs,
            "WARDEN_SERVER_STOP_GRACE_SECS",
        );
        override_u64(
            &mut self.server.kill_wait_secs,
            "WARDEN_SERVER_KILL_WAIT_SECS",
        );
        override_bool(&mut self.server.auto_restart, "WARDEN_SERVER_AUTO_RESTART");
        override_u64(
            &mut self.server.restart_delay_secs,
            "WARDEN_SERVER_RESTART_DELAY_SECS",
        );
        override_usize(
            &mut self.server.stderr_tail_lines,
            "WARDEN_SERVER_STDERR_TAIL_LINES",
        );

        // Log Pipeline
        override_string(
            &mut self.log_pipeline.rules_path,
            "WARDEN_LOG_PIPELINE_RULES_PATH",
        );
        override_bool(
            &mut self.log_pipeline.builtin_rules,
            "WARDEN_LOG_PIPELINE_BUILTIN_RULES",
        );
        override_usize(
            &mut self.log_pipeline.recent_lines_capacity,
            "WARDEN_LOG_PIPELINE_RECENT_LINES_CAPACITY",
        );
        override_usize(
            &mut self.log_pipeline.line_channel_capacity,
            "WARDEN_LOG_PIPELINE_LINE_CHANNEL_CAPACITY",
        );

        // Queue
        override_string(&mut self.queue.dir, "WARDEN_QUEUE_DIR");
        override_u64(
            &mut self.queue.poll_interval_ms,
            "WARDEN_QUEUE_POLL_INTERVAL_MS",
        );
        override_u64(
            &mut self.queue.quiet_period_ms,
            "WARDEN_QUEUE_QUIET_PERIOD_MS",
        );
        override_u64(
            &mut self.queue.response_timeout_ms,
            "WARDEN_QUEUE_RESPONSE_TIMEOUT_MS",
        );
        override_u64(
            &mut self.queue.command_timeout_secs,
            "WARDEN_QUEUE_COMMAND_TIMEOUT_SECS",
        );
        override_u64(&mut self.queue.retention_secs, "WARDEN_QUEUE_RETENTION_SECS");
        override_string(&mut self.queue.echo_pattern, "WARDEN_QUEUE_ECHO_PATTERN");

        // Metrics
        override_bool(&mut self.metrics.enabled, "WARDEN_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "WARDEN_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "WARDEN_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), WardenError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.server.executable.trim().is_empty() {
            return Err(invalid("server.executable", "must not be empty"));
        }

        if self.server.stop_grace_secs == 0 {
            return Err(invalid("server.stop_grace_secs", "must be greater than 0"));
        }

        if self.server.stderr_tail_lines == 0 {
            return Err(invalid("server.stderr_tail_lines", "must be greater than 0"));
        }

        if self.log_pipeline.recent_lines_capacity == 0 {
            return Err(invalid(
                "log_pipeline.recent_lines_capacity",
                "must be greater than 0",
            ));
        }

        if self.log_pipeline.line_channel_capacity == 0 {
            return Err(invalid(
                "log_pipeline.line_channel_capacity",
                "must be greater than 0",
            ));
        }

        if self.queue.dir.trim().is_empty() {
            return Err(invalid("queue.dir", "must not be empty"));
        }

        if self.queue.poll_interval_ms == 0 {
            return Err(invalid("queue.poll_interval_ms", "must be greater than 0"));
        }

        if self.queue.quiet_period_ms == 0 {
            return Err(invalid("queue.quiet_period_ms", "must be greater than 0"));
        }

        if self.queue.response_timeout_ms < self.queue.quiet_period_ms {
            return Err(invalid(
                "queue.response_timeout_ms",
                "must be at least queue.quiet_period_ms",
            ));
        }

        if self.queue.command_timeout_secs == 0 {
            return Err(invalid("queue.command_timeout_secs", "must be greater than 0"));
        }

        if !self.queue.echo_pattern.is_empty() && !self.queue.echo_pattern.contains("{command}")
        {
            return Err(invalid(
                "queue.echo_pattern",
                "must contain the {command} placeholder",
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must be non-zero when metrics are enabled"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> WardenError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
    /// PID 파일 경로
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/warden".to_owned(),
            pid_file: "/var/run/warden.pid".to_owned(),
        }
    }
}

/// 감독 대상 서버 프로세스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 실행 파일 경로
    pub executable: String,
    /// 실행 인자
    pub args: Vec<String>,
    /// 작업 디렉토리 (빈 문자열이면 데몬의 현재 디렉토리)
    pub working_dir: String,
    /// graceful 종료 시 stdin 으로 전송할 명령
    pub stop_command: String,
    /// 종료 대기 시간 (초), 초과 시 강제 종료
    pub stop_grace_secs: u64,
    /// 강제 종료 후 프로세스 회수 대기 시간 (초)
    pub kill_wait_secs: u64,
    /// 크래시 후 자동 재시작 여부
    pub auto_restart: bool,
    /// 자동 재시작 전 대기 시간 (초)
    pub restart_delay_secs: u64,
    /// 크래시 진단용으로 보관할 stderr 라인 수
    pub stderr_tail_lines: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            executable: "java".to_owned(),
            args: vec![
                "-Xmx2G".to_owned(),
                "-jar".to_owned(),
                "server.jar".to_owned(),
                "nogui".to_owned(),
            ],
            working_dir: String::new(),
            stop_command: "stop".to_owned(),
            stop_grace_secs: 30,
            kill_wait_secs: 5,
            auto_restart: false,
            restart_delay_secs: 5,
            stderr_tail_lines: 50,
        }
    }
}

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogPipelineConfig {
    /// 규칙 파일 또는 디렉토리 경로 (빈 문자열이면 파일 규칙 없음)
    pub rules_path: String,
    /// 파일 규칙 뒤에 내장 규칙 세트를 추가할지 여부
    pub builtin_rules: bool,
    /// 최근 라인 버퍼 용량
    pub recent_lines_capacity: usize,
    /// 수퍼바이저 → 파서 라인 채널 용량
    pub line_channel_capacity: usize,
}

impl Default for LogPipelineConfig {
    fn default() -> Self {
        Self {
            rules_path: "/etc/warden/rules".to_owned(),
            builtin_rules: true,
            recent_lines_capacity: 1000,
            line_channel_capacity: 1024,
        }
    }
}

/// 커맨드 큐 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 큐 디렉토리 (엔트리당 JSON 파일 하나)
    pub dir: String,
    /// 큐 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 출력 상관 분석 quiet period (밀리초)
    pub quiet_period_ms: u64,
    /// 명령 전송 후 첫 출력까지 기다리는 최대 시간 (밀리초)
    pub response_timeout_ms: u64,
    /// CLI 의 기본 완료 대기 시간 (초)
    pub command_timeout_secs: u64,
    /// 종료 상태 엔트리 보존 기간 (초)
    pub retention_secs: u64,
    /// 서버가 명령을 에코하는 라인 패턴 (`{command}` 자리표시자, 빈 문자열이면 비활성)
    pub echo_pattern: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            dir: "/var/lib/warden/queue".to_owned(),
            poll_interval_ms: 200,
            quiet_period_ms: 500,
            response_timeout_ms: 5000,
            command_timeout_secs: 30,
            retention_secs: 3600,
            echo_pattern: String::new(),
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus exporter 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 바인드 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
