//! 로그 파서 -- 출력 라인을 이벤트로 변환하고 이벤트 버스에 발행합니다.
//!
//! 라인 하나를 받으면:
//! 1. 최근 라인 버퍼에 저장
//! 2. broadcast 구독자(출력 상관 분석기)에게 전달
//! 3. 규칙 엔진으로 매칭 → 매칭된 규칙의 이벤트, 또는 낮은 우선순위의 `RawLogLine` 이벤트
//! 4. 이벤트 버스에 발행
//!
//! 매칭되지 않은 라인도 반드시 이벤트로 발행됩니다.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use warden_core::bus::{DispatchReport, EventBus};
use warden_core::event::{
    Event, EventSource, FIELD_LINE, FIELD_STREAM, KIND_RAW_LOG_LINE, PRIORITY_LOW,
    PRIORITY_NORMAL,
};
use warden_core::metrics as m;
use warden_core::types::OutputLine;

use crate::buffer::RecentLines;
use crate::rule::RuleEngine;

/// broadcast 채널 최소 용량
const MIN_BROADCAST_CAPACITY: usize = 64;

/// 로그 파서
pub struct LogParser {
    engine: RuleEngine,
    bus: Arc<EventBus>,
    recent: Mutex<RecentLines>,
    line_tx: broadcast::Sender<OutputLine>,
}

impl LogParser {
    /// 새 파서를 생성합니다. `capacity`는 최근 라인 버퍼와 broadcast 채널 용량입니다.
    pub fn new(engine: RuleEngine, bus: Arc<EventBus>, capacity: usize) -> Self {
        let (line_tx, _) = broadcast::channel(capacity.max(MIN_BROADCAST_CAPACITY));
        metrics::gauge!(m::LOG_PIPELINE_RULES_LOADED).set(engine.rule_count() as f64);
        metrics::gauge!(m::LOG_PIPELINE_RULES_SKIPPED).set(engine.skipped().len() as f64);
        Self {
            engine,
            bus,
            recent: Mutex::new(RecentLines::new(capacity)),
            line_tx,
        }
    }

    /// 라인을 이벤트로 변환합니다. 부수 효과가 없습니다.
    pub fn parse(&self, line: &OutputLine) -> Event {
        match self.engine.match_line(&line.text) {
            Some(matched) => Event::new(matched.event_kind, EventSource::Log)
                .with_fields(matched.fields)
                .with_priority(PRIORITY_NORMAL),
            None => Event::new(KIND_RAW_LOG_LINE, EventSource::Log)
                .with_field(FIELD_LINE, line.text.as_str())
                .with_field(FIELD_STREAM, line.stream.to_string())
                .with_priority(PRIORITY_LOW),
        }
    }

    /// 라인을 저장·전달·변환·발행합니다.
    pub fn ingest(&self, line: OutputLine) -> DispatchReport {
        metrics::counter!(m::LOG_PIPELINE_LINES_TOTAL, m::LABEL_STREAM => line.stream.to_string())
            .increment(1);

        let event = self.parse(&line);
        if event.kind == KIND_RAW_LOG_LINE {
            metrics::counter!(m::LOG_PIPELINE_UNMATCHED_TOTAL).increment(1);
        } else {
            metrics::counter!(m::LOG_PIPELINE_RULE_MATCHES_TOTAL, m::LABEL_KIND => event.kind.clone())
                .increment(1);
        }

        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line.clone());

        // 구독자가 없으면 Err 이지만 정상 상황입니다.
        let _ = self.line_tx.send(line);

        self.bus.publish(event)
    }

    /// 이후 수신되는 라인을 구독합니다.
    pub fn subscribe(&self) -> broadcast::Receiver<OutputLine> {
        self.line_tx.subscribe()
    }

    /// 최근 라인 버퍼의 복사본 (오래된 순)
    pub fn recent_lines(&self) -> Vec<OutputLine> {
        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot()
    }

    /// 최근 `n`개 라인 (오래된 순)
    pub fn recent_tail(&self, n: usize) -> Vec<OutputLine> {
        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .tail(n)
    }

    /// 최근 라인 버퍼 사용률
    pub fn buffer_utilization(&self) -> f64 {
        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .utilization()
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}

impl std::fmt::Debug for LogParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogParser")
            .field("engine", &self.engine)
            .field("subscribers", &self.line_tx.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use warden_core::bus::EventHandler;
    use warden_core::types::StreamKind;

    use crate::rule::LineRule;

    fn join_parser(bus: Arc<EventBus>) -> LogParser {
        let engine = RuleEngine::compile(vec![LineRule::new(
            r"(\w+) joined the game",
            "PlayerJoin",
            &["player_name"],
        )]);
        LogParser::new(engine, bus, 8)
    }

    #[test]
    fn matched_line_produces_rule_event() {
        let parser = join_parser(Arc::new(EventBus::new()));
        let event = parser.parse(&OutputLine::stdout(
            "[12:00:00] [Server thread/INFO]: Alice joined the game",
        ));
        assert_eq!(event.kind, "PlayerJoin");
        assert_eq!(event.source, EventSource::Log);
        assert_eq!(event.fields.len(), 1);
        assert_eq!(event.field("player_name"), Some("Alice"));
    }

    #[test]
    fn unmatched_line_produces_low_priority_raw_event() {
        let parser = join_parser(Arc::new(EventBus::new()));
        let event = parser.parse(&OutputLine::stderr("Exception in thread main"));
        assert_eq!(event.kind, KIND_RAW_LOG_LINE);
        assert_eq!(event.priority, PRIORITY_LOW);
        assert_eq!(event.field(FIELD_LINE), Some("Exception in thread main"));
        assert_eq!(event.field(FIELD_STREAM), Some("stderr"));
    }

    #[test]
    fn ingest_publishes_every_line() {
        let bus = Arc::new(EventBus::new());
        let kinds = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&kinds);
        bus.register_any(
            0,
            EventHandler::sync("collector", move |event: &Event| {
                sink.lock().unwrap().push(event.kind.clone());
                Ok(())
            }),
        )
        .unwrap();

        let parser = join_parser(Arc::clone(&bus));
        parser.ingest(OutputLine::stdout("Alice joined the game"));
        parser.ingest(OutputLine::stdout("Preparing level \"world\""));

        assert_eq!(*kinds.lock().unwrap(), vec!["PlayerJoin", KIND_RAW_LOG_LINE]);
    }

    #[test]
    fn recent_lines_keep_all_lines_with_eviction() {
        let parser = LogParser::new(RuleEngine::empty(), Arc::new(EventBus::new()), 2);
        for text in ["a", "b", "c"] {
            parser.ingest(OutputLine::stdout(text));
        }
        let recent: Vec<_> = parser.recent_lines().into_iter().map(|l| l.text).collect();
        assert_eq!(recent, vec!["b", "c"]);
        assert_eq!(parser.recent_tail(1)[0].text, "c");
    }

    #[tokio::test]
    async fn subscribers_receive_lines_in_order() {
        let parser = LogParser::new(RuleEngine::empty(), Arc::new(EventBus::new()), 16);
        let mut rx = parser.subscribe();

        parser.ingest(OutputLine::stdout("one"));
        parser.ingest(OutputLine::stderr("two"));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.text, "one");
        assert_eq!(second.text, "two");
        assert_eq!(second.stream, StreamKind::Stderr);
    }
}
