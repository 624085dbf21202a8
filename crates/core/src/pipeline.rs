//! 파이프라인 trait — 모듈 생명주기와 모듈 간 seam 정의
//!
//! - [`Pipeline`]: 정적 디스패치용 생명주기 trait (RPITIT)
//! - [`DynPipeline`]: 데몬이 `Box<dyn DynPipeline>`으로 모듈을 다루기 위한 객체 안전 버전
//! - [`LineSink`]: 서버 stdin 으로 한 줄을 전송하는 seam.
//!   커맨드 큐가 수퍼바이저 크레이트에 의존하지 않도록 core 에 둡니다.

use std::future::Future;
use std::pin::Pin;

use crate::error::WardenError;

/// `Send` 가능한 박스 퓨처
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 성능 저하 또는 부분 장애
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 모듈 생명주기 trait
pub trait Pipeline: Send + Sync {
    /// 모듈을 시작합니다. 백그라운드 태스크를 spawn 하고 즉시 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), WardenError>> + Send;

    /// 모듈을 정지합니다. 백그라운드 태스크가 끝날 때까지 대기합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), WardenError>> + Send;

    /// 현재 헬스 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// [`Pipeline`]의 객체 안전 버전
pub trait DynPipeline: Send + Sync {
    fn start(&mut self) -> BoxFuture<'_, Result<(), WardenError>>;
    fn stop(&mut self) -> BoxFuture<'_, Result<(), WardenError>>;
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

impl<T: Pipeline> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), WardenError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), WardenError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}

/// stdin 전송 실패
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// 서버가 Running 상태가 아님
    #[error("server is not running (state: {state})")]
    NotRunning { state: String },

    /// 쓰기 실패 (broken pipe 등)
    #[error("failed to write to server stdin: {0}")]
    Write(String),
}

/// 서버 stdin 으로 한 줄을 보내는 대상
///
/// 구현체는 `text`에 줄 끝 문자를 붙여 기록하고, 기록이 끝난 뒤에 반환해야 합니다.
pub trait LineSink: Send + Sync {
    fn send_line<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<(), SinkError>>;
}
