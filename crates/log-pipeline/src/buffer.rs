//! 최근 라인 버퍼 -- 고정 용량 링 버퍼
//!
//! [`RecentLines`]는 서버 출력 라인을 고정 용량만큼 보관합니다.
//! 가득 차면 가장 오래된 라인부터 제거합니다. 출력 상관 분석과
//! 크래시 진단에서 최근 출력을 조회하는 데 사용됩니다.

use std::collections::VecDeque;

use warden_core::types::OutputLine;

/// 고정 용량 최근 라인 버퍼
pub struct RecentLines {
    /// 버퍼 내부 저장소
    buffer: VecDeque<OutputLine>,
    /// 최대 용량
    capacity: usize,
    /// 밀려난 라인 카운터 (통계용)
    evicted_count: u64,
    /// 총 유입 라인 카운터
    total_received: u64,
}

impl RecentLines {
    /// 새 버퍼를 생성합니다. 용량이 0 이면 1 로 보정합니다.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity.min(10_000)),
            capacity,
            evicted_count: 0,
            total_received: 0,
        }
    }

    /// 라인을 추가합니다. 가장 오래된 라인이 밀려났으면 `true`를 반환합니다.
    pub fn push(&mut self, line: OutputLine) -> bool {
        self.total_received += 1;

        let evicted = if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
            self.evicted_count += 1;
            true
        } else {
            false
        };

        self.buffer.push_back(line);
        evicted
    }

    /// 보관 중인 라인을 오래된 순서로 복사해 반환합니다.
    pub fn snapshot(&self) -> Vec<OutputLine> {
        self.buffer.iter().cloned().collect()
    }

    /// 가장 최근 `n`개 라인을 오래된 순서로 반환합니다.
    pub fn tail(&self, n: usize) -> Vec<OutputLine> {
        let skip = self.buffer.len().saturating_sub(n);
        self.buffer.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 지금까지 밀려난 라인 수
    pub fn evicted_count(&self) -> u64 {
        self.evicted_count
    }

    /// 총 유입 라인 수
    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    /// 버퍼 사용률을 0.0~1.0 범위로 반환합니다.
    pub fn utilization(&self) -> f64 {
        f64::from(u32::try_from(self.buffer.len()).unwrap_or(u32::MAX))
            / f64::from(u32::try_from(self.capacity).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[OutputLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut buf = RecentLines::new(3);
        for i in 1..=3 {
            assert!(!buf.push(OutputLine::stdout(format!("line{i}"))));
        }
        assert!(buf.push(OutputLine::stdout("line4")));

        assert_eq!(buf.len(), 3);
        assert_eq!(buf.evicted_count(), 1);
        assert_eq!(buf.total_received(), 4);
        assert_eq!(texts(&buf.snapshot()), vec!["line2", "line3", "line4"]);
    }

    #[test]
    fn tail_returns_most_recent_in_order() {
        let mut buf = RecentLines::new(10);
        for i in 0..5 {
            buf.push(OutputLine::stderr(format!("e{i}")));
        }
        assert_eq!(texts(&buf.tail(2)), vec!["e3", "e4"]);
        assert_eq!(buf.tail(100).len(), 5);
        assert!(buf.tail(0).is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut buf = RecentLines::new(0);
        buf.push(OutputLine::stdout("a"));
        buf.push(OutputLine::stdout("b"));
        assert_eq!(buf.capacity(), 1);
        assert_eq!(texts(&buf.snapshot()), vec!["b"]);
    }

    #[test]
    fn utilization_calculation() {
        let mut buf = RecentLines::new(4);
        assert_eq!(buf.utilization(), 0.0);
        buf.push(OutputLine::stdout("a"));
        buf.push(OutputLine::stdout("b"));
        assert!((buf.utilization() - 0.5).abs() < f64::EPSILON);
    }
}
