#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`rule`]: YAML 기반 라인 규칙 로딩과 first-match 규칙 엔진
//! - [`parser`]: 라인 → 이벤트 변환 및 이벤트 버스 발행
//! - [`buffer`]: 최근 라인 링 버퍼
//! - [`pipeline`]: 라인 수신 태스크 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! mpsc<OutputLine> -> LogParser -> RuleEngine -> Event -> EventBus
//!                         |
//!                   RecentLines + broadcast (Correlator)
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod rule;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogPipeline, LogPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 파서
pub use parser::LogParser;

// 규칙 엔진
pub use rule::{LineRule, RuleCompileError, RuleEngine, RuleLoader, RuleMatch};

// 버퍼
pub use buffer::RecentLines;
