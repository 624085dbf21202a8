//! 이벤트 모델 — 서버 출력과 시스템 상태 변화를 나타내는 구조화된 레코드
//!
//! [`Event`]는 로그 라인에서 파생되거나 직접 발행되는 이벤트로,
//! 종류(kind) 태그와 이름 있는 필드 집합을 가집니다.
//! 취소 플래그는 원자적으로 관리되어 공유 참조(`&Event`, `Arc<Event>`)로도
//! 핸들러가 이벤트를 취소할 수 있습니다.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

// --- 이벤트 종류 상수 ---

/// 어떤 규칙에도 매칭되지 않은 원시 로그 라인
pub const KIND_RAW_LOG_LINE: &str = "RawLogLine";
/// 서버 프로세스 비정상 종료
pub const KIND_SERVER_CRASHED: &str = "ServerCrashed";
/// 서버 프로세스 시작 완료
pub const KIND_SERVER_STARTED: &str = "ServerStarted";
/// 서버 프로세스 정상 종료
pub const KIND_SERVER_STOPPED: &str = "ServerStopped";
/// 프로세스 상태 전이
pub const KIND_SERVER_STATE_CHANGED: &str = "ServerStateChanged";
/// 큐 명령 처리 완료 (성공/실패/타임아웃 포함)
pub const KIND_COMMAND_COMPLETED: &str = "CommandCompleted";

// --- 우선순위 상수 (높을수록 먼저 실행) ---

pub const PRIORITY_LOWEST: i32 = -200;
pub const PRIORITY_LOW: i32 = -100;
pub const PRIORITY_NORMAL: i32 = 0;
pub const PRIORITY_HIGH: i32 = 100;
pub const PRIORITY_HIGHEST: i32 = 200;
/// 관찰 전용 핸들러용. 다른 모든 핸들러 뒤에 실행되며 이벤트를 변경하거나 취소하지 않아야 합니다.
pub const PRIORITY_MONITOR: i32 = -300;

// --- 필드 이름 상수 ---

pub const FIELD_LINE: &str = "line";
pub const FIELD_STREAM: &str = "stream";
pub const FIELD_PID: &str = "pid";
pub const FIELD_EXIT_CODE: &str = "exit_code";
pub const FIELD_STDERR_TAIL: &str = "stderr_tail";
pub const FIELD_FROM: &str = "from";
pub const FIELD_TO: &str = "to";
pub const FIELD_COMMAND_ID: &str = "command_id";
pub const FIELD_STATUS: &str = "status";
pub const FIELD_RESULT: &str = "result";
pub const FIELD_ERROR: &str = "error";

/// 이벤트 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    /// 서버 출력 라인에서 파생
    Log,
    /// 수퍼바이저/디스패처 등 내부 컴포넌트가 발행
    System,
    /// 외부 호출자가 직접 발행
    Manual,
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log => write!(f, "log"),
            Self::System => write!(f, "system"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// 구조화된 이벤트
///
/// # 사용 예시
/// ```
/// use warden_core::event::{Event, EventSource, PRIORITY_HIGH};
///
/// let event = Event::new("PlayerJoin", EventSource::Log)
///     .with_field("player_name", "Alice")
///     .with_priority(PRIORITY_HIGH);
///
/// assert_eq!(event.field("player_name"), Some("Alice"));
/// assert!(!event.is_cancelled());
/// event.cancel();
/// assert!(event.is_cancelled());
/// ```
#[derive(Debug)]
pub struct Event {
    /// 이벤트 고유 ID (UUID v4)
    pub id: String,
    /// 이벤트 종류 태그 (라우팅 키)
    pub kind: String,
    /// 이름 있는 필드
    pub fields: BTreeMap<String, String>,
    /// 발생 시각
    pub timestamp: SystemTime,
    /// 이벤트 우선순위 (정보성, 디스패치 순서는 핸들러 우선순위가 결정)
    pub priority: i32,
    /// 이벤트 출처
    pub source: EventSource,
    cancelled: AtomicBool,
}

impl Event {
    /// 새 이벤트를 생성합니다.
    pub fn new(kind: impl Into<String>, source: EventSource) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.into(),
            fields: BTreeMap::new(),
            timestamp: SystemTime::now(),
            priority: PRIORITY_NORMAL,
            source,
            cancelled: AtomicBool::new(false),
        }
    }

    /// 시스템 이벤트를 생성합니다.
    pub fn system(kind: impl Into<String>) -> Self {
        Self::new(kind, EventSource::System)
    }

    /// 필드를 추가합니다.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// 여러 필드를 한 번에 추가합니다.
    pub fn with_fields<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// 우선순위를 설정합니다.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 필드 값을 조회합니다.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// 이벤트를 취소합니다.
    ///
    /// 취소 이후 더 낮은 우선순위의 핸들러는 호출되지 않습니다.
    /// 이미 실행 중인 비동기 핸들러는 중단되지 않습니다.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// 취소 여부를 반환합니다.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Clone for Event {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind.clone(),
            fields: self.fields.clone(),
            timestamp: self.timestamp,
            priority: self.priority,
            source: self.source,
            cancelled: AtomicBool::new(self.is_cancelled()),
        }
    }
}

impl Serialize for Event {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Event", 7)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("fields", &self.fields)?;
        state.serialize_field("timestamp", &unix_millis(self.timestamp))?;
        state.serialize_field("priority", &self.priority)?;
        state.serialize_field("source", &self.source)?;
        state.serialize_field("cancelled", &self.is_cancelled())?;
        state.end()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.kind, self.source)?;
        for (name, value) in &self.fields {
            write!(f, " {name}={value:?}")?;
        }
        Ok(())
    }
}

/// UNIX epoch 기준 밀리초. epoch 이전 시각은 0 으로 취급합니다.
fn unix_millis(time: SystemTime) -> u128 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
