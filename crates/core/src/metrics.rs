//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `warden_`
//! - 모듈명: `bus_`, `log_pipeline_`, `supervisor_`, `queue_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 이벤트 종류 레이블 키
pub const LABEL_KIND: &str = "kind";

/// 스트림 레이블 키 (stdout, stderr)
pub const LABEL_STREAM: &str = "stream";

/// 명령 처리 결과 레이블 키 (completed, timed_out, failed)
pub const LABEL_STATUS: &str = "status";

// ─── Event Bus 메트릭 ───────────────────────────────────────────────

/// Bus: 발행된 이벤트 수 (counter, label: kind)
pub const BUS_EVENTS_PUBLISHED_TOTAL: &str = "warden_bus_events_published_total";

/// Bus: 취소된 이벤트 수 (counter)
pub const BUS_EVENTS_CANCELLED_TOTAL: &str = "warden_bus_events_cancelled_total";

/// Bus: 핸들러 실패 수 (counter)
pub const BUS_HANDLER_FAILURES_TOTAL: &str = "warden_bus_handler_failures_total";

/// Bus: 등록된 핸들러 수 (gauge)
pub const BUS_HANDLERS_REGISTERED: &str = "warden_bus_handlers_registered";

// ─── Log Pipeline 메트릭 ────────────────────────────────────────────

/// Log Pipeline: 수신한 라인 수 (counter, label: stream)
pub const LOG_PIPELINE_LINES_TOTAL: &str = "warden_log_pipeline_lines_total";

/// Log Pipeline: 규칙 매칭 수 (counter, label: kind)
pub const LOG_PIPELINE_RULE_MATCHES_TOTAL: &str = "warden_log_pipeline_rule_matches_total";

/// Log Pipeline: 매칭되지 않은 라인 수 (counter)
pub const LOG_PIPELINE_UNMATCHED_TOTAL: &str = "warden_log_pipeline_unmatched_total";

/// Log Pipeline: 로드된 규칙 수 (gauge)
pub const LOG_PIPELINE_RULES_LOADED: &str = "warden_log_pipeline_rules_loaded";

/// Log Pipeline: 컴파일 실패로 건너뛴 규칙 수 (gauge)
pub const LOG_PIPELINE_RULES_SKIPPED: &str = "warden_log_pipeline_rules_skipped";

// ─── Supervisor 메트릭 ─────────────────────────────────────────────

/// Supervisor: 서버 시작 횟수 (counter)
pub const SUPERVISOR_STARTS_TOTAL: &str = "warden_supervisor_starts_total";

/// Supervisor: 크래시 횟수 (counter)
pub const SUPERVISOR_CRASHES_TOTAL: &str = "warden_supervisor_crashes_total";

/// Supervisor: 강제 종료 횟수 (counter)
pub const SUPERVISOR_FORCED_KILLS_TOTAL: &str = "warden_supervisor_forced_kills_total";

/// Supervisor: stdin 으로 전송한 라인 수 (counter)
pub const SUPERVISOR_LINES_SENT_TOTAL: &str = "warden_supervisor_lines_sent_total";

/// Supervisor: 서버 실행 중 여부 (gauge, 0 또는 1)
pub const SUPERVISOR_SERVER_UP: &str = "warden_supervisor_server_up";

/// Supervisor: 서버 프로세스 CPU 사용률 (gauge, %, 코어 하나가 100)
pub const SUPERVISOR_CPU_PERCENT: &str = "warden_supervisor_cpu_percent";

/// Supervisor: 서버 프로세스 RSS (gauge, MiB)
pub const SUPERVISOR_MEMORY_MB: &str = "warden_supervisor_memory_mb";

/// Supervisor: 서버 프로세스 스레드 수 (gauge)
pub const SUPERVISOR_THREADS: &str = "warden_supervisor_threads";

// ─── Command Queue 메트릭 ──────────────────────────────────────────

/// Queue: 처리 완료된 명령 수 (counter, label: status)
pub const QUEUE_COMMANDS_PROCESSED_TOTAL: &str = "warden_queue_commands_processed_total";

/// Queue: 손상되어 건너뛴 엔트리 수 (counter)
pub const QUEUE_CORRUPT_ENTRIES_TOTAL: &str = "warden_queue_corrupt_entries_total";

/// Queue: GC 로 삭제된 엔트리 수 (counter)
pub const QUEUE_GC_REMOVED_TOTAL: &str = "warden_queue_gc_removed_total";

/// Queue: 대기 중인 명령 수 (gauge)
pub const QUEUE_PENDING: &str = "warden_queue_pending";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge)
pub const DAEMON_UPTIME_SECONDS: &str = "warden_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, label: version, 항상 1)
pub const DAEMON_BUILD_INFO: &str = "warden_daemon_build_info";

/// Daemon: 등록된 모듈 수 (gauge)
pub const DAEMON_MODULES_REGISTERED: &str = "warden_daemon_modules_registered";

/// 모든 메트릭의 설명을 등록합니다.
///
/// recorder 설치 직후 한 번 호출합니다. recorder 가 없어도 안전합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Event Bus
    describe_counter!(
        BUS_EVENTS_PUBLISHED_TOTAL,
        "Total number of events published on the event bus"
    );
    describe_counter!(
        BUS_EVENTS_CANCELLED_TOTAL,
        "Events cancelled by a handler before dispatch finished"
    );
    describe_counter!(
        BUS_HANDLER_FAILURES_TOTAL,
        "Handler invocations that returned an error or panicked"
    );
    describe_gauge!(BUS_HANDLERS_REGISTERED, "Currently registered handlers");

    // Log Pipeline
    describe_counter!(
        LOG_PIPELINE_LINES_TOTAL,
        "Output lines received from the supervised server"
    );
    describe_counter!(
        LOG_PIPELINE_RULE_MATCHES_TOTAL,
        "Lines matched by a rule, per event kind"
    );
    describe_counter!(
        LOG_PIPELINE_UNMATCHED_TOTAL,
        "Lines that matched no rule and became RawLogLine events"
    );
    describe_gauge!(LOG_PIPELINE_RULES_LOADED, "Compiled line rules");
    describe_gauge!(
        LOG_PIPELINE_RULES_SKIPPED,
        "Rules skipped because their pattern failed to compile"
    );

    // Supervisor
    describe_counter!(SUPERVISOR_STARTS_TOTAL, "Server process spawns");
    describe_counter!(SUPERVISOR_CRASHES_TOTAL, "Unexpected server exits");
    describe_counter!(
        SUPERVISOR_FORCED_KILLS_TOTAL,
        "Stops that escalated to a forced kill after the grace period"
    );
    describe_counter!(SUPERVISOR_LINES_SENT_TOTAL, "Lines written to server stdin");
    describe_gauge!(SUPERVISOR_SERVER_UP, "1 when the server process is running");
    describe_gauge!(
        SUPERVISOR_CPU_PERCENT,
        "Server process CPU usage since the previous sample"
    );
    describe_gauge!(SUPERVISOR_MEMORY_MB, "Server process resident memory in MiB");
    describe_gauge!(SUPERVISOR_THREADS, "Server process thread count");

    // Command Queue
    describe_counter!(
        QUEUE_COMMANDS_PROCESSED_TOTAL,
        "Commands that reached a terminal status, per status"
    );
    describe_counter!(
        QUEUE_CORRUPT_ENTRIES_TOTAL,
        "Malformed queue entries skipped by the poller"
    );
    describe_counter!(QUEUE_GC_REMOVED_TOTAL, "Queue entries garbage-collected");
    describe_gauge!(QUEUE_PENDING, "Pending commands seen at the last poll");

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Seconds since the daemon started");
    describe_gauge!(DAEMON_BUILD_INFO, "Build information, labelled by version");
    describe_gauge!(DAEMON_MODULES_REGISTERED, "Modules registered with the daemon");
}
