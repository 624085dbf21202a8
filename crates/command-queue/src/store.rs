//! 파일 기반 큐 저장소
//!
//! 디렉토리 하나에 엔트리당 JSON 파일 하나를 둡니다.
//!
//! ```text
//! <queue dir>/
//!   <uuid>.json   직렬화된 Command
//!   <uuid>.ack    호출자가 결과를 확인했다는 표시 (빈 파일)
//!   .entry-*.tmp  기록 중인 임시 파일 (목록에서 무시)
//! ```
//!
//! 모든 기록은 같은 디렉토리의 임시 파일에 쓴 뒤 rename 으로 교체하므로,
//! 다른 프로세스의 reader 는 반쯤 쓰인 엔트리를 보지 않습니다.
//! 엔트리 생성은 덮어쓰지 않는 rename 으로 ID 충돌을 거부합니다.
//! 상태 갱신은 수퍼바이저 프로세스 하나만 수행하며, 프로세스 내부에서는
//! `compare_and_swap`이 쓰기 락과 리비전 비교로 직렬화됩니다.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use warden_core::metrics as m;

use crate::command::{Command, CommandStatus};
use crate::error::QueueError;

const ENTRY_EXT: &str = "json";
const ACK_EXT: &str = "ack";

/// 엔트리 파일 최대 크기 (10MB)
const MAX_ENTRY_SIZE: u64 = 10 * 1024 * 1024;

/// 디렉토리 스캔 결과
#[derive(Debug, Default)]
pub struct ScanReport {
    /// 정상 엔트리 (발행 시각 순)
    pub entries: Vec<Command>,
    /// 해석하지 못한 엔트리 파일
    pub corrupt: Vec<PathBuf>,
}

/// 가비지 컬렉션 결과
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GcReport {
    /// 삭제한 엔트리 수
    pub removed_entries: usize,
    /// 삭제한 고아 ack 마커 수
    pub removed_markers: usize,
}

struct StoreInner {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

/// 파일 기반 커맨드 큐 저장소
///
/// 모든 메서드는 블로킹 파일 I/O 를 수행합니다.
/// 비동기 컨텍스트에서는 [`blocking`]을 통해 호출합니다.
#[derive(Clone)]
pub struct QueueStore {
    inner: Arc<StoreInner>,
}

impl QueueStore {
    /// 큐 디렉토리를 열고, 없으면 생성합니다.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, QueueError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                dir,
                write_lock: Mutex::new(()),
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    fn entry_path(&self, id: Uuid) -> PathBuf {
        self.inner.dir.join(format!("{id}.{ENTRY_EXT}"))
    }

    fn ack_path(&self, id: Uuid) -> PathBuf {
        self.inner.dir.join(format!("{id}.{ACK_EXT}"))
    }

    /// 새 엔트리를 기록합니다. 같은 ID 의 엔트리가 있으면 실패합니다.
    pub fn insert(&self, command: &Command) -> Result<(), QueueError> {
        Command::validate_text(&command.text)?;
        let tmp = self.write_temp(command)?;
        tmp.persist_noclobber(self.entry_path(command.id))
            .map_err(|e| {
                if e.error.kind() == io::ErrorKind::AlreadyExists {
                    QueueError::InvalidCommand(format!("duplicate command id {}", command.id))
                } else {
                    QueueError::Io(e.error)
                }
            })?;
        tracing::debug!(id = %command.id, text = %command.text, "command enqueued");
        Ok(())
    }

    /// 엔트리 하나를 읽습니다.
    pub fn load(&self, id: Uuid) -> Result<Command, QueueError> {
        let path = self.entry_path(id);
        read_entry(&path).map_err(|e| match e {
            QueueError::Io(err) if err.kind() == io::ErrorKind::NotFound => QueueError::NotFound(id),
            other => other,
        })
    }

    /// 모든 엔트리를 읽습니다. 손상된 엔트리는 경고 후 건너뜁니다.
    pub fn list(&self) -> Result<Vec<Command>, QueueError> {
        Ok(self.scan()?.entries)
    }

    /// 모든 엔트리를 읽고 손상된 파일 목록도 함께 반환합니다.
    pub fn scan(&self) -> Result<ScanReport, QueueError> {
        let mut report = ScanReport::default();
        for entry in fs::read_dir(&self.inner.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            match read_entry(&path) {
                Ok(command) => report.entries.push(command),
                // scan 도중 GC 가 지운 엔트리
                Err(QueueError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping corrupt queue entry");
                    metrics::counter!(m::QUEUE_CORRUPT_ENTRIES_TOTAL).increment(1);
                    report.corrupt.push(path);
                }
            }
        }
        report
            .entries
            .sort_by(|a, b| a.issued_at.cmp(&b.issued_at).then(a.id.cmp(&b.id)));
        Ok(report)
    }

    /// 전송 대기 중인 엔트리 (우선순위 내림차순, 같으면 FIFO)
    pub fn pending(&self) -> Result<Vec<Command>, QueueError> {
        let mut pending: Vec<Command> = self
            .list()?
            .into_iter()
            .filter(|c| c.status == CommandStatus::Pending)
            .collect();
        // list 가 발행 순으로 정렬되어 있으므로 안정 정렬이 FIFO 를 유지합니다.
        pending.sort_by(|a, b| b.priority.cmp(&a.priority));
        metrics::gauge!(m::QUEUE_PENDING).set(pending.len() as f64);
        Ok(pending)
    }

    /// 디스크의 리비전이 `expected_revision`일 때만 `new`로 교체합니다.
    ///
    /// 성공하면 리비전이 증가된 저장본을 반환합니다.
    pub fn compare_and_swap(
        &self,
        id: Uuid,
        expected_revision: u64,
        new: Command,
    ) -> Result<Command, QueueError> {
        if new.id != id {
            return Err(QueueError::InvalidCommand(format!(
                "entry id mismatch: {id} != {}",
                new.id
            )));
        }

        let _guard = self
            .inner
            .write_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let current = self.load(id)?;
        if current.revision != expected_revision {
            return Err(QueueError::Conflict {
                id,
                expected: expected_revision,
                actual: current.revision,
            });
        }

        let mut stored = new;
        stored.revision = expected_revision + 1;
        let tmp = self.write_temp(&stored)?;
        tmp.persist(self.entry_path(id)).map_err(|e| e.error)?;
        tracing::debug!(%id, status = %stored.status, revision = stored.revision, "command updated");
        Ok(stored)
    }

    /// 호출자가 결과를 확인했음을 표시합니다. 엔트리 자체는 수정하지 않습니다.
    pub fn acknowledge(&self, id: Uuid) -> Result<(), QueueError> {
        if !self.entry_path(id).exists() {
            return Err(QueueError::NotFound(id));
        }
        fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.ack_path(id))?;
        Ok(())
    }

    pub fn is_acknowledged(&self, id: Uuid) -> bool {
        self.ack_path(id).exists()
    }

    /// 종료 상태 엔트리 중 확인되었거나 보존 기간이 지난 것을 삭제합니다.
    pub fn collect_garbage(&self, retention: Duration) -> Result<GcReport, QueueError> {
        let _guard = self
            .inner
            .write_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let mut report = GcReport::default();

        for command in self.list()? {
            let Some(age) = command.finished_for(now) else {
                continue;
            };
            if self.is_acknowledged(command.id) || age >= retention {
                remove_if_exists(&self.entry_path(command.id))?;
                remove_if_exists(&self.ack_path(command.id))?;
                report.removed_entries += 1;
            }
        }

        for entry in fs::read_dir(&self.inner.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ACK_EXT) {
                continue;
            }
            if !path.with_extension(ENTRY_EXT).exists() {
                remove_if_exists(&path)?;
                report.removed_markers += 1;
            }
        }

        if report.removed_entries > 0 {
            metrics::counter!(m::QUEUE_GC_REMOVED_TOTAL).increment(report.removed_entries as u64);
            tracing::info!(
                removed = report.removed_entries,
                markers = report.removed_markers,
                "queue garbage collected"
            );
        }
        Ok(report)
    }

    fn write_temp(&self, command: &Command) -> Result<tempfile::NamedTempFile, QueueError> {
        let json = serde_json::to_vec_pretty(command)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".entry-")
            .suffix(".tmp")
            .tempfile_in(&self.inner.dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }
}

fn read_entry(path: &Path) -> Result<Command, QueueError> {
    let size = fs::metadata(path)?.len();
    if size > MAX_ENTRY_SIZE {
        return Err(QueueError::QueueCorruption {
            path: path.to_path_buf(),
            reason: format!("entry too large: {size} bytes"),
        });
    }
    let raw = fs::read(path)?;
    serde_json::from_slice(&raw).map_err(|e| QueueError::QueueCorruption {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// 블로킹 저장소 연산을 `spawn_blocking`으로 실행합니다.
pub async fn blocking<T, F>(f: F) -> Result<T, QueueError>
where
    F: FnOnce() -> Result<T, QueueError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| QueueError::Io(io::Error::other(e)))?
}
