//! 이벤트 버스 벤치마크
//!
//! 핸들러 수와 취소 여부에 따른 publish 디스패치 비용을 측정합니다.

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use warden_core::bus::{EventBus, EventHandler};
use warden_core::event::{Event, EventSource, PRIORITY_HIGH};

fn counting_bus(handlers: usize) -> (EventBus, Arc<AtomicU64>) {
    let bus = EventBus::new();
    let counter = Arc::new(AtomicU64::new(0));
    for i in 0..handlers {
        let counter = Arc::clone(&counter);
        bus.register(
            "PlayerChat",
            (i % 4) as i32 * 10,
            EventHandler::sync(format!("h{i}"), move |_: &Event| {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }),
        )
        .unwrap();
    }
    (bus, counter)
}

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus_publish");
    group.throughput(Throughput::Elements(1));

    for handlers in [1usize, 8, 32] {
        let (bus, _counter) = counting_bus(handlers);
        group.bench_with_input(BenchmarkId::from_parameter(handlers), &handlers, |b, _| {
            b.iter(|| {
                let event = Event::new("PlayerChat", EventSource::Log)
                    .with_field("player_name", "Alice")
                    .with_field("message", "hello");
                black_box(bus.publish(event))
            })
        });
    }

    group.finish();
}

fn bench_publish_cancelled_early(c: &mut Criterion) {
    let (bus, _counter) = counting_bus(32);
    bus.register(
        "PlayerChat",
        PRIORITY_HIGH,
        EventHandler::sync("canceller", |event: &Event| {
            event.cancel();
            Ok(())
        }),
    )
    .unwrap();

    c.bench_function("bus_publish_cancelled_early", |b| {
        b.iter(|| black_box(bus.publish(Event::new("PlayerChat", EventSource::Log))))
    });
}

fn bench_publish_no_handlers(c: &mut Criterion) {
    let bus = EventBus::new();
    c.bench_function("bus_publish_no_handlers", |b| {
        b.iter(|| black_box(bus.publish(Event::new("RawLogLine", EventSource::Log))))
    });
}

criterion_group!(
    benches,
    bench_publish,
    bench_publish_cancelled_early,
    bench_publish_no_handlers
);
criterion_main!(benches);
