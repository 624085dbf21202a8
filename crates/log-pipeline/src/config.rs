//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`LogPipelineConfig`](warden_core::config::LogPipelineConfig)를
//! 기반으로 로그 파이프라인 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```
//! use warden_core::config::WardenConfig;
//! use warden_log_pipeline::config::PipelineConfig;
//!
//! let core_config = WardenConfig::default();
//! let config = PipelineConfig::from_core(&core_config.log_pipeline);
//! config.validate().unwrap();
//! ```

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 규칙 파일 또는 디렉토리 경로 (빈 문자열이면 파일 규칙 없음)
    pub rules_path: String,
    /// 내장 규칙 사용 여부
    pub builtin_rules: bool,
    /// 최근 라인 버퍼 용량
    pub recent_lines_capacity: usize,
    /// 수퍼바이저 → 파서 라인 채널 용량
    pub line_channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&warden_core::config::LogPipelineConfig::default())
    }
}

impl PipelineConfig {
    /// core의 `LogPipelineConfig`에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &warden_core::config::LogPipelineConfig) -> Self {
        Self {
            rules_path: core.rules_path.clone(),
            builtin_rules: core.builtin_rules,
            recent_lines_capacity: core.recent_lines_capacity,
            line_channel_capacity: core.line_channel_capacity,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_RECENT_LINES: usize = 1_000_000;
        const MAX_CHANNEL_CAPACITY: usize = 1_000_000;

        if self.recent_lines_capacity == 0 || self.recent_lines_capacity > MAX_RECENT_LINES {
            return Err(LogPipelineError::Config {
                field: "recent_lines_capacity".to_owned(),
                reason: format!("must be 1-{MAX_RECENT_LINES}"),
            });
        }

        if self.line_channel_capacity == 0 || self.line_channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(LogPipelineError::Config {
                field: "line_channel_capacity".to_owned(),
                reason: format!("must be 1-{MAX_CHANNEL_CAPACITY}"),
            });
        }

        // Path traversal 체크: ".." 컴포넌트 검출
        if Path::new(&self.rules_path)
            .components()
            .any(|c| c == Component::ParentDir)
        {
            return Err(LogPipelineError::Config {
                field: "rules_path".to_owned(),
                reason: format!(
                    "rules path '{}' contains path traversal pattern '..'",
                    self.rules_path
                ),
            });
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 규칙 경로를 설정합니다.
    pub fn rules_path(mut self, path: impl Into<String>) -> Self {
        self.config.rules_path = path.into();
        self
    }

    /// 내장 규칙 사용 여부를 설정합니다.
    pub fn builtin_rules(mut self, enabled: bool) -> Self {
        self.config.builtin_rules = enabled;
        self
    }

    /// 최근 라인 버퍼 용량을 설정합니다.
    pub fn recent_lines_capacity(mut self, capacity: usize) -> Self {
        self.config.recent_lines_capacity = capacity;
        self
    }

    /// 라인 채널 용량을 설정합니다.
    pub fn line_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.line_channel_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
