//! 로그 파서 벤치마크
//!
//! 내장 규칙 세트 기준 라인 매칭과 이벤트 변환 처리량을 측정합니다.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use warden_core::bus::EventBus;
use warden_core::types::OutputLine;
use warden_log_pipeline::{LogParser, RuleEngine};

const SAMPLE_LINES: &[&str] = &[
    "[12:00:00] [Server thread/INFO]: Alice joined the game",
    "[12:00:01] [Server thread/INFO]: <Alice> anyone up for a nether trip?",
    "[12:00:02] [Server thread/WARN]: Can't keep up! Is the server overloaded?",
    "[12:00:03] [Server thread/INFO]: Alice was slain by Zombie",
    "[12:00:04] [Worker-Main-3/INFO]: Preparing spawn area: 83%",
    "[12:00:05] [Server thread/INFO]: Alice left the game",
];

fn bench_match_line(c: &mut Criterion) {
    let engine = RuleEngine::with_default_rules();
    let mut group = c.benchmark_group("rule_engine");
    group.throughput(Throughput::Elements(SAMPLE_LINES.len() as u64));
    group.bench_function("match_line_default_rules", |b| {
        b.iter(|| {
            for line in SAMPLE_LINES {
                black_box(engine.match_line(black_box(line)));
            }
        })
    });
    group.finish();
}

fn bench_ingest(c: &mut Criterion) {
    let parser = LogParser::new(
        RuleEngine::with_default_rules(),
        Arc::new(EventBus::new()),
        1000,
    );
    let lines: Vec<OutputLine> = SAMPLE_LINES.iter().map(|l| OutputLine::stdout(*l)).collect();

    let mut group = c.benchmark_group("log_parser");
    group.throughput(Throughput::Elements(lines.len() as u64));
    group.bench_function("ingest", |b| {
        b.iter(|| {
            for line in &lines {
                black_box(parser.ingest(line.clone()));
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_match_line, bench_ingest);
criterion_main!(benches);
