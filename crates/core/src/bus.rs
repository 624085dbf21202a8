//! 이벤트 버스 — 우선순위와 협력적 취소를 지원하는 인프로세스 pub/sub
//!
//! # 디스패치 규칙
//! - 핸들러는 우선순위 내림차순으로 호출되고, 같은 우선순위에서는 등록 순서가 빠른 쪽이 먼저입니다.
//! - 같은 우선순위의 핸들러 묶음(tier)이 모두 끝난 뒤 다음 tier 로 넘어갑니다.
//!   동기 핸들러는 tier 안에서 완료되고, 비동기 핸들러는 tokio 태스크로 spawn 만 됩니다.
//! - tier 가 끝났을 때 이벤트가 취소되어 있으면 더 낮은 tier 는 호출하지 않습니다.
//!   단, [`RegisterOptions::receive_cancelled`]로 등록된 핸들러는 예외입니다.
//! - 핸들러 에러와 panic 은 핸들러 단위로 격리되어 로그만 남깁니다. `publish`는 실패하지 않습니다.
//! - 디스패치는 등록 목록의 스냅샷으로 진행됩니다. 핸들러 안에서 등록/해제한 내용은
//!   다음 `publish`부터 반영됩니다.
//!
//! # 사용 예시
//! ```
//! use warden_core::bus::{EventBus, EventHandler};
//! use warden_core::event::{Event, EventSource, PRIORITY_HIGH};
//!
//! let bus = EventBus::new();
//! let handler = EventHandler::sync("greeter", |event: &Event| {
//!     println!("hello {:?}", event.field("player_name"));
//!     Ok(())
//! });
//! bus.register("PlayerJoin", PRIORITY_HIGH, handler.clone()).unwrap();
//!
//! let report = bus.publish(Event::new("PlayerJoin", EventSource::Log));
//! assert_eq!(report.invoked, 1);
//!
//! assert!(bus.unregister("PlayerJoin", &handler));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, warn};

use crate::error::{BusError, HandlerError};
use crate::event::Event;
use crate::metrics as m;
use crate::pipeline::BoxFuture;

/// 모든 이벤트 종류를 받는 와일드카드 키
pub const ANY_KIND: &str = "*";

type SyncCallback = dyn Fn(&Event) -> Result<(), HandlerError> + Send + Sync;
type AsyncCallback =
    dyn Fn(Arc<Event>) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync;

enum Callback {
    Sync(Box<SyncCallback>),
    Async(Box<AsyncCallback>),
}

struct HandlerInner {
    name: String,
    callback: Callback,
}

/// 이벤트 핸들러
///
/// 핸들러의 식별자는 내부 `Arc` 포인터입니다. 같은 `EventHandler`(또는 그 clone)를
/// 같은 종류에 두 번 등록해도 등록은 하나만 유지됩니다.
#[derive(Clone)]
pub struct EventHandler(Arc<HandlerInner>);

impl EventHandler {
    /// 동기 핸들러를 생성합니다. 해당 tier 안에서 호출이 완료됩니다.
    pub fn sync<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self(Arc::new(HandlerInner {
            name: name.into(),
            callback: Callback::Sync(Box::new(f)),
        }))
    }

    /// 비동기 핸들러를 생성합니다. tokio 태스크로 spawn 되며 완료를 기다리지 않습니다.
    pub fn asynchronous<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Self(Arc::new(HandlerInner {
            name: name.into(),
            callback: Callback::Async(Box::new(move |event| Box::pin(f(event)))),
        }))
    }

    /// 핸들러 이름
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// 비동기 핸들러인지 여부
    pub fn is_async(&self) -> bool {
        matches!(self.0.callback, Callback::Async(_))
    }

    fn same_as(&self, other: &EventHandler) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("name", &self.0.name)
            .field("async", &self.is_async())
            .finish()
    }
}

/// 등록 옵션
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    /// 이벤트가 취소된 뒤에도 호출될지 여부 (관찰 전용 핸들러용)
    pub receive_cancelled: bool,
}

/// 등록 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl RegistrationId {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Clone)]
struct Registration {
    id: RegistrationId,
    priority: i32,
    /// 등록 순서 (같은 우선순위의 tie-break, 작을수록 먼저)
    order: u64,
    handler: EventHandler,
    options: RegisterOptions,
}

/// 한 번의 `publish` 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// 호출 완료된 동기 핸들러 수 (실패 포함)
    pub invoked: usize,
    /// spawn 된 비동기 핸들러 수
    pub scheduled: usize,
    /// 에러를 반환했거나 panic 한 동기 핸들러 수, spawn 하지 못한 비동기 핸들러 수
    pub failed: usize,
    /// 취소로 인해 호출되지 않은 핸들러 수
    pub skipped: usize,
    /// 디스패치 종료 시점의 취소 여부
    pub cancelled: bool,
}

/// 이벤트 버스 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusStats {
    /// 종류별 발행 횟수
    pub published: HashMap<String, u64>,
    /// 취소된 디스패치 수
    pub cancelled: u64,
    /// 핸들러 실패 수 (비동기 핸들러 실패 포함)
    pub handler_failures: u64,
}

/// 인프로세스 이벤트 버스
///
/// 데몬에서 한 번 생성되어 `Arc<EventBus>`로 각 컴포넌트에 전달됩니다.
pub struct EventBus {
    registry: RwLock<HashMap<String, Vec<Registration>>>,
    next_order: AtomicU64,
    closed: AtomicBool,
    published: Mutex<HashMap<String, u64>>,
    cancelled: AtomicU64,
    handler_failures: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            next_order: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            published: Mutex::new(HashMap::new()),
            cancelled: AtomicU64::new(0),
            handler_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// `kind` 이벤트에 핸들러를 등록합니다.
    pub fn register(
        &self,
        kind: &str,
        priority: i32,
        handler: EventHandler,
    ) -> Result<RegistrationId, BusError> {
        self.register_with(kind, priority, handler, RegisterOptions::default())
    }

    /// 모든 종류의 이벤트를 받는 핸들러를 등록합니다.
    ///
    /// 종류별 핸들러와 같은 우선순위/등록 순서 규칙으로 병합되어 호출됩니다.
    pub fn register_any(
        &self,
        priority: i32,
        handler: EventHandler,
    ) -> Result<RegistrationId, BusError> {
        self.register_with(ANY_KIND, priority, handler, RegisterOptions::default())
    }

    /// 옵션과 함께 핸들러를 등록합니다.
    ///
    /// 같은 핸들러가 같은 종류에 이미 등록되어 있으면 기존 등록을 유지하고
    /// 그 식별자를 반환합니다.
    pub fn register_with(
        &self,
        kind: &str,
        priority: i32,
        handler: EventHandler,
        options: RegisterOptions,
    ) -> Result<RegistrationId, BusError> {
        if kind.is_empty() {
            return Err(BusError::EmptyKind);
        }
        if self.is_closed() {
            return Err(BusError::Closed);
        }

        let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());
        let entries = registry.entry(kind.to_owned()).or_default();

        if let Some(existing) = entries.iter().find(|r| r.handler.same_as(&handler)) {
            debug!(
                kind,
                handler = handler.name(),
                "handler already registered, keeping existing registration"
            );
            return Ok(existing.id);
        }

        let order = self.next_order.fetch_add(1, Ordering::Relaxed);
        let id = RegistrationId(order);
        entries.push(Registration {
            id,
            priority,
            order,
            handler,
            options,
        });
        drop(registry);

        metrics::gauge!(m::BUS_HANDLERS_REGISTERED).increment(1.0);
        Ok(id)
    }

    /// `kind`에서 핸들러 등록을 해제합니다. 해제했으면 `true`를 반환합니다.
    pub fn unregister(&self, kind: &str, handler: &EventHandler) -> bool {
        self.remove_where(|k, r| k == kind && r.handler.same_as(handler))
    }

    /// 등록 식별자로 등록을 해제합니다.
    pub fn unregister_id(&self, id: RegistrationId) -> bool {
        self.remove_where(|_, r| r.id == id)
    }

    fn remove_where(&self, pred: impl Fn(&str, &Registration) -> bool) -> bool {
        let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());
        let mut removed = 0usize;
        for (kind, entries) in registry.iter_mut() {
            let before = entries.len();
            entries.retain(|r| !pred(kind, r));
            removed += before - entries.len();
        }
        registry.retain(|_, entries| !entries.is_empty());
        drop(registry);

        if removed > 0 {
            metrics::gauge!(m::BUS_HANDLERS_REGISTERED).decrement(removed as f64);
        }
        removed > 0
    }

    /// `kind`에 등록된 핸들러 수 (와일드카드 제외)
    pub fn handler_count(&self, kind: &str) -> usize {
        let registry = self.registry.read().unwrap_or_else(|e| e.into_inner());
        registry.get(kind).map_or(0, Vec::len)
    }

    /// 이벤트를 발행합니다.
    pub fn publish(&self, event: Event) -> DispatchReport {
        self.publish_shared(Arc::new(event))
    }

    /// 이미 공유된 이벤트를 발행합니다. 호출자는 디스패치 후 취소 여부 등을 확인할 수 있습니다.
    pub fn publish_shared(&self, event: Arc<Event>) -> DispatchReport {
        let mut report = DispatchReport::default();

        if self.is_closed() {
            debug!(kind = %event.kind, "event bus closed, dropping event");
            return report;
        }

        self.record_published(&event.kind);

        let snapshot = self.snapshot(&event.kind);
        let mut index = 0;
        while index < snapshot.len() {
            let tier_priority = snapshot[index].priority;
            let tier_end = snapshot[index..]
                .iter()
                .position(|r| r.priority != tier_priority)
                .map_or(snapshot.len(), |offset| index + offset);

            // 이전 tier 에서 취소되었으면 receive_cancelled 핸들러만 실행
            let cancelled_before_tier = event.is_cancelled();

            for registration in &snapshot[index..tier_end] {
                if cancelled_before_tier && !registration.options.receive_cancelled {
                    report.skipped += 1;
                    continue;
                }
                self.invoke(registration, &event, &mut report);
            }

            index = tier_end;
        }

        report.cancelled = event.is_cancelled();
        if report.cancelled {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(m::BUS_EVENTS_CANCELLED_TOTAL).increment(1);
        }
        report
    }

    fn invoke(&self, registration: &Registration, event: &Arc<Event>, report: &mut DispatchReport) {
        let handler = &registration.handler;
        match &handler.0.callback {
            Callback::Sync(f) => {
                report.invoked += 1;
                match catch_unwind(AssertUnwindSafe(|| f(event))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        report.failed += 1;
                        self.record_failure();
                        warn!(
                            kind = %event.kind,
                            handler = handler.name(),
                            error = %e,
                            "event handler failed"
                        );
                    }
                    Err(panic) => {
                        report.failed += 1;
                        self.record_failure();
                        warn!(
                            kind = %event.kind,
                            handler = handler.name(),
                            panic = panic_message(&panic),
                            "event handler panicked"
                        );
                    }
                }
            }
            Callback::Async(f) => {
                let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                    report.failed += 1;
                    self.record_failure();
                    warn!(
                        kind = %event.kind,
                        handler = handler.name(),
                        "no tokio runtime available, async handler not scheduled"
                    );
                    return;
                };

                let future = match catch_unwind(AssertUnwindSafe(|| f(Arc::clone(event)))) {
                    Ok(future) => future,
                    Err(panic) => {
                        report.failed += 1;
                        self.record_failure();
                        warn!(
                            kind = %event.kind,
                            handler = handler.name(),
                            panic = panic_message(&panic),
                            "async event handler panicked while creating its future"
                        );
                        return;
                    }
                };

                let failures = Arc::clone(&self.handler_failures);
                let name = handler.name().to_owned();
                let kind = event.kind.clone();
                runtime.spawn(async move {
                    if let Err(e) = future.await {
                        failures.fetch_add(1, Ordering::Relaxed);
                        metrics::counter!(m::BUS_HANDLER_FAILURES_TOTAL).increment(1);
                        warn!(kind = %kind, handler = %name, error = %e, "async event handler failed");
                    }
                });
                report.scheduled += 1;
            }
        }
    }

    /// 종류별 + 와일드카드 등록을 합쳐 디스패치 순서로 정렬한 스냅샷
    fn snapshot(&self, kind: &str) -> Vec<Registration> {
        let registry = self.registry.read().unwrap_or_else(|e| e.into_inner());
        let mut snapshot: Vec<Registration> = registry
            .get(kind)
            .into_iter()
            .chain(registry.get(ANY_KIND).filter(|_| kind != ANY_KIND))
            .flatten()
            .cloned()
            .collect();
        drop(registry);

        snapshot.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.order.cmp(&b.order)));
        snapshot
    }

    fn record_published(&self, kind: &str) {
        let mut published = self.published.lock().unwrap_or_else(|e| e.into_inner());
        *published.entry(kind.to_owned()).or_insert(0) += 1;
        drop(published);
        metrics::counter!(m::BUS_EVENTS_PUBLISHED_TOTAL, m::LABEL_KIND => kind.to_owned())
            .increment(1);
    }

    fn record_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::BUS_HANDLER_FAILURES_TOTAL).increment(1);
    }

    /// 발행 통계 스냅샷
    pub fn stats(&self) -> BusStats {
        let published = self
            .published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        BusStats {
            published,
            cancelled: self.cancelled.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        }
    }

    /// 버스를 닫습니다. 이후 `publish`는 아무것도 하지 않고, 등록은 실패합니다.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());
            let count: usize = registry.values().map(Vec::len).sum();
            registry.clear();
            drop(registry);
            metrics::gauge!(m::BUS_HANDLERS_REGISTERED).decrement(count as f64);
            debug!(handlers = count, "event bus closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("EventBus")
            .field("kinds", &registry.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{
        EventSource, PRIORITY_HIGH, PRIORITY_HIGHEST, PRIORITY_LOW, PRIORITY_NORMAL,
    };
    use std::sync::Mutex as StdMutex;

    fn recorder(log: &Arc<StdMutex<Vec<String>>>, name: &str) -> EventHandler {
        let log = Arc::clone(log);
        let label = name.to_owned();
        EventHandler::sync(name, move |_event: &Event| {
            log.lock().unwrap().push(label.clone());
            Ok(())
        })
    }

    fn event(kind: &str) -> Event {
        Event::new(kind, EventSource::Manual)
    }

    #[test]
    fn handlers_run_in_priority_then_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        bus.register("k", PRIORITY_LOW, recorder(&log, "low")).unwrap();
        bus.register("k", PRIORITY_HIGH, recorder(&log, "high-1")).unwrap();
        bus.register("k", PRIORITY_NORMAL, recorder(&log, "normal")).unwrap();
        bus.register("k", PRIORITY_HIGH, recorder(&log, "high-2")).unwrap();

        let report = bus.publish(event("k"));

        assert_eq!(report.invoked, 4);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["high-1", "high-2", "normal", "low"]
        );
    }

    #[test]
    fn cancellation_skips_lower_tiers_but_finishes_current_tier() {
        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        let canceller_log = Arc::clone(&log);
        let canceller = EventHandler::sync("canceller", move |event: &Event| {
            canceller_log.lock().unwrap().push("canceller".to_owned());
            event.cancel();
            Ok(())
        });
        bus.register("k", PRIORITY_HIGH, canceller).unwrap();
        bus.register("k", PRIORITY_HIGH, recorder(&log, "same-tier")).unwrap();
        bus.register("k", PRIORITY_NORMAL, recorder(&log, "lower")).unwrap();
        bus.register("k", PRIORITY_LOW, recorder(&log, "lowest")).unwrap();

        let report = bus.publish(event("k"));

        assert!(report.cancelled);
        assert_eq!(report.invoked, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(*log.lock().unwrap(), vec!["canceller", "same-tier"]);
    }

    #[test]
    fn receive_cancelled_handler_still_runs() {
        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let canceller = EventHandler::sync("canceller", |event: &Event| {
            event.cancel();
            Ok(())
        });
        bus.register("k", PRIORITY_HIGHEST, canceller).unwrap();
        bus.register("k", PRIORITY_NORMAL, recorder(&log, "normal")).unwrap();
        bus.register_with(
            "k",
            PRIORITY_LOW,
            recorder(&log, "auditor"),
            RegisterOptions {
                receive_cancelled: true,
            },
        )
        .unwrap();

        bus.publish(event("k"));

        assert_eq!(*log.lock().unwrap(), vec!["auditor"]);
    }

    #[test]
    fn failing_and_panicking_handlers_are_isolated() {
        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        bus.register(
            "k",
            PRIORITY_HIGH,
            EventHandler::sync("fails", |_: &Event| Err(HandlerError::new("boom"))),
        )
        .unwrap();
        bus.register(
            "k",
            PRIORITY_HIGH,
            EventHandler::sync("panics", |_: &Event| panic!("handler panic")),
        )
        .unwrap();
        bus.register("k", PRIORITY_LOW, recorder(&log, "survivor")).unwrap();

        let report = bus.publish(event("k"));

        assert_eq!(report.invoked, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(*log.lock().unwrap(), vec!["survivor"]);
        assert_eq!(bus.stats().handler_failures, 2);
    }

    #[test]
    fn registration_is_idempotent_per_kind_and_handler() {
        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let handler = recorder(&log, "once");

        let first = bus.register("k", PRIORITY_NORMAL, handler.clone()).unwrap();
        let second = bus.register("k", PRIORITY_HIGH, handler.clone()).unwrap();
        assert_eq!(first, second);
        assert_eq!(bus.handler_count("k"), 1);

        // 다른 종류에는 별도로 등록 가능
        bus.register("other", PRIORITY_NORMAL, handler).unwrap();
        assert_eq!(bus.handler_count("other"), 1);

        bus.publish(event("k"));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn unregister_during_invocation_takes_effect_next_publish() {
        let bus = Arc::new(EventBus::new());
        let calls = Arc::new(AtomicU64::new(0));
        let slot: Arc<StdMutex<Option<EventHandler>>> = Arc::new(StdMutex::new(None));

        let bus_ref = Arc::downgrade(&bus);
        let slot_ref = Arc::clone(&slot);
        let calls_ref = Arc::clone(&calls);
        let handler = EventHandler::sync("self-removing", move |event: &Event| {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            if let (Some(bus), Some(me)) = (bus_ref.upgrade(), slot_ref.lock().unwrap().clone()) {
                bus.unregister(&event.kind, &me);
            }
            Ok(())
        });
        *slot.lock().unwrap() = Some(handler.clone());
        bus.register("k", PRIORITY_NORMAL, handler).unwrap();

        bus.publish(event("k"));
        bus.publish(event("k"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_count("k"), 0);
    }

    #[test]
    fn unregister_unknown_handler_returns_false() {
        let bus = EventBus::new();
        let handler = EventHandler::sync("h", |_: &Event| Ok(()));
        assert!(!bus.unregister("k", &handler));
        let id = bus.register("k", 0, handler).unwrap();
        assert!(bus.unregister_id(id));
        assert!(!bus.unregister_id(id));
    }

    #[test]
    fn wildcard_handlers_merge_with_kind_handlers() {
        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        bus.register("k", PRIORITY_NORMAL, recorder(&log, "kind")).unwrap();
        bus.register_any(PRIORITY_HIGH, recorder(&log, "any-high")).unwrap();
        bus.register_any(PRIORITY_NORMAL, recorder(&log, "any-normal")).unwrap();

        bus.publish(event("k"));
        bus.publish(event("unrelated"));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["any-high", "kind", "any-normal", "any-high", "any-normal"]
        );
    }

    #[test]
    fn cancellation_is_per_event() {
        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        bus.register(
            "k",
            PRIORITY_HIGH,
            EventHandler::sync("cancel-flagged", |event: &Event| {
                if event.field("cancel").is_some() {
                    event.cancel();
                }
                Ok(())
            }),
        )
        .unwrap();
        bus.register("k", PRIORITY_LOW, recorder(&log, "low")).unwrap();

        let first = bus.publish(event("k").with_field("cancel", "yes"));
        let second = bus.publish(event("k"));

        assert!(first.cancelled);
        assert!(!second.cancelled);
        assert_eq!(*log.lock().unwrap(), vec!["low"]);
    }

    #[test]
    fn cancellation_does_not_leak_into_concurrent_dispatch() {
        use std::sync::Barrier;

        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let cancelled = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));

        let (held, resume) = (Arc::clone(&cancelled), Arc::clone(&release));
        bus.register(
            "k",
            PRIORITY_HIGH,
            EventHandler::sync("cancel-and-hold", move |event: &Event| {
                if event.field("cancel").is_some() {
                    event.cancel();
                    held.wait();
                    resume.wait();
                }
                Ok(())
            }),
        )
        .unwrap();
        bus.register("k", PRIORITY_LOW, recorder(&log, "low")).unwrap();

        std::thread::scope(|scope| {
            let first = scope.spawn(|| bus.publish(event("k").with_field("cancel", "yes")));

            // 첫 이벤트가 취소된 채 핸들러 안에 머무는 동안 두 번째 이벤트를 디스패치합니다.
            cancelled.wait();
            let second = scope.spawn(|| bus.publish(event("k"))).join().unwrap();
            assert!(!second.cancelled);
            assert_eq!(*log.lock().unwrap(), vec!["low"]);

            release.wait();
            let first = first.join().unwrap();
            assert!(first.cancelled);
            assert_eq!(first.skipped, 1);
        });

        assert_eq!(*log.lock().unwrap(), vec!["low"]);
    }

    #[test]
    fn async_handler_without_runtime_counts_as_failure() {
        let bus = EventBus::new();
        bus.register(
            "k",
            PRIORITY_NORMAL,
            EventHandler::asynchronous("async", |_event| async { Ok(()) }),
        )
        .unwrap();

        let report = bus.publish(event("k"));
        assert_eq!(report.scheduled, 0);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn async_handler_is_scheduled_not_awaited() {
        let bus = EventBus::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<String>();
        let tx = Arc::new(StdMutex::new(Some(tx)));
        let gate = Arc::new(tokio::sync::Notify::new());

        let gate_ref = Arc::clone(&gate);
        bus.register(
            "k",
            PRIORITY_NORMAL,
            EventHandler::asynchronous("async", move |event: Arc<Event>| {
                let tx = Arc::clone(&tx);
                let gate = Arc::clone(&gate_ref);
                async move {
                    gate.notified().await;
                    if let Some(tx) = tx.lock().unwrap().take() {
                        let _ = tx.send(event.kind.clone());
                    }
                    Ok(())
                }
            }),
        )
        .unwrap();

        // 핸들러가 gate 에서 대기 중이어도 publish 는 즉시 반환됨
        let report = bus.publish(event("k"));
        assert_eq!(report.scheduled, 1);
        assert_eq!(report.invoked, 0);

        gate.notify_one();
        let kind = tokio::time::timeout(std::time::Duration::from_secs(5), rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kind, "k");
    }

    #[test]
    fn closed_bus_drops_events_and_rejects_registration() {
        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        bus.register("k", 0, recorder(&log, "h")).unwrap();
        bus.close();

        let report = bus.publish(event("k"));
        assert_eq!(report, DispatchReport::default());
        assert!(log.lock().unwrap().is_empty());
        assert!(matches!(
            bus.register("k", 0, recorder(&log, "late")),
            Err(BusError::Closed)
        ));
    }

    #[test]
    fn empty_kind_is_rejected() {
        let bus = EventBus::new();
        let handler = EventHandler::sync("h", |_: &Event| Ok(()));
        assert!(matches!(bus.register("", 0, handler), Err(BusError::EmptyKind)));
    }

    #[test]
    fn stats_count_published_and_cancelled() {
        let bus = EventBus::new();
        bus.register(
            "cancel-me",
            0,
            EventHandler::sync("c", |event: &Event| {
                event.cancel();
                Ok(())
            }),
        )
        .unwrap();

        bus.publish(event("a"));
        bus.publish(event("a"));
        bus.publish(event("cancel-me"));

        let stats = bus.stats();
        assert_eq!(stats.published.get("a"), Some(&2));
        assert_eq!(stats.published.get("cancel-me"), Some(&1));
        assert_eq!(stats.cancelled, 1);
    }
}
