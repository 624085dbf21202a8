#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`command`]: 큐 엔트리 모델과 상태 전이
//! - [`store`]: 파일 기반 엔트리 저장소 (원자적 쓰기, compare-and-swap, GC)
//! - [`correlator`]: 전송한 명령에 뒤따르는 서버 출력 수집
//! - [`dispatcher`]: 수퍼바이저 측 큐 처리 태스크 (Pipeline trait 구현)
//! - [`client`]: 호출자 측 enqueue / wait API
//! - [`config`]: 큐 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! QueueClient --enqueue--> <dir>/<uuid>.json <--poll-- CommandDispatcher
//!      ^                                                  |  send_line
//!      +------------ wait_for_completion ----------       v
//!                                               LineSink (ServerSupervisor)
//!                                                         |
//!                         Correlator <-- LogParser::subscribe
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod correlator;
pub mod dispatcher;
pub mod error;
pub mod store;

// --- 주요 타입 re-export ---

// 디스패처
pub use dispatcher::{CommandDispatcher, CommandDispatcherBuilder};

// 클라이언트
pub use client::{CommandOutcome, QueueClient};

// 모델
pub use command::{Command, CommandStatus};

// 저장소
pub use store::{GcReport, QueueStore, ScanReport};

// 상관 분석
pub use correlator::{Correlation, CorrelationSettings, Correlator};

// 설정
pub use config::CommandQueueConfig;

// 에러
pub use error::QueueError;
