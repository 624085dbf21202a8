//! 에러 타입 — 도메인별 에러 정의

/// Warden 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 이벤트 버스 에러
    #[error("event bus error: {0}")]
    Bus(#[from] BusError),

    /// 서버 프로세스 감독 에러
    #[error("supervisor error: {0}")]
    Supervisor(String),

    /// 로그 파이프라인 에러
    #[error("log pipeline error: {0}")]
    Pipeline(String),

    /// 커맨드 큐 에러
    #[error("command queue error: {0}")]
    Queue(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 이벤트 버스 에러
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// 빈 이벤트 종류로 등록 시도
    #[error("event kind must not be empty")]
    EmptyKind,

    /// 버스가 이미 종료됨
    #[error("event bus is closed")]
    Closed,
}

/// 이벤트 핸들러 실행 실패
///
/// 핸들러 하나의 실패는 로그로만 남고 다른 핸들러 실행이나
/// `publish` 결과에 영향을 주지 않습니다.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// 메시지로 핸들러 에러를 생성합니다.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
