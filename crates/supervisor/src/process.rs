//! 서버 프로세스 자원 사용량 샘플링
//!
//! CPU 사용률은 직전 샘플과의 차이로 계산되므로 같은 [`ProcessSampler`]로
//! 반복해서 호출해야 의미 있는 값이 나옵니다. 첫 샘플의 CPU 값은 0 입니다.

use std::sync::Mutex;

use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, System};

use warden_core::metrics as m;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// 서버 프로세스 성능 지표
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessMetrics {
    pub pid: u32,
    /// 직전 샘플 이후의 CPU 사용률 (코어 하나가 100)
    pub cpu_percent: f32,
    /// RSS (MiB)
    pub memory_mb: f64,
    /// 스레드 수. 플랫폼이 제공하지 않으면 None
    pub threads: Option<usize>,
}

/// 샘플 사이의 CPU 시간을 기억하는 `sysinfo::System` 래퍼
pub struct ProcessSampler {
    system: Mutex<System>,
}

impl ProcessSampler {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    /// `pid` 프로세스를 샘플링합니다. 프로세스가 없으면 None 입니다.
    pub fn sample(&self, pid: u32) -> Option<ProcessMetrics> {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        let sys_pid = Pid::from(pid as usize);
        let refresh = ProcessRefreshKind::new().with_cpu().with_memory();
        if !system.refresh_process_specifics(sys_pid, refresh) {
            return None;
        }

        let process = system.process(sys_pid)?;
        Some(ProcessMetrics {
            pid,
            cpu_percent: process.cpu_usage(),
            memory_mb: process.memory() as f64 / BYTES_PER_MB,
            threads: process.tasks().map(|tasks| tasks.len()),
        })
    }
}

impl Default for ProcessSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// 샘플을 gauge 로 내보냅니다.
pub(crate) fn record(sample: &ProcessMetrics) {
    metrics::gauge!(m::SUPERVISOR_CPU_PERCENT).set(f64::from(sample.cpu_percent));
    metrics::gauge!(m::SUPERVISOR_MEMORY_MB).set(sample.memory_mb);
    if let Some(threads) = sample.threads {
        metrics::gauge!(m::SUPERVISOR_THREADS).set(threads as f64);
    }
}
