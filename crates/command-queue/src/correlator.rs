//! 출력 상관 분석기 — 전송한 명령에 뒤따르는 서버 출력을 수집합니다.
//!
//! 두 가지 전략을 지원합니다.
//!
//! - **quiet period**: 명령 전송 후 첫 라인부터, `quiet_period` 동안 새 라인이 없을 때까지
//!   들어온 라인을 결과로 봅니다.
//! - **echo**: 서버가 명령을 에코하는 라인(`echo_pattern`, `{command}` 치환)이 나타날 때까지
//!   기다린 뒤, 그 이후 라인을 quiet period 규칙으로 수집합니다. 에코 라인 이전의 출력은
//!   다른 명령이나 서버 자체 로그로 보고 버립니다.
//!
//! 두 전략 모두 휴리스틱입니다. 동시에 여러 명령이 진행 중이면 출력이 섞일 수 있으므로
//! 디스패처는 한 번에 한 명령만 전송합니다.

use std::time::Duration;

use regex::Regex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;

use warden_core::types::OutputLine;

use crate::config::ECHO_PLACEHOLDER;

/// 한 명령의 결과로 수집할 최대 라인 수
pub const MAX_RESULT_LINES: usize = 1000;

/// 상관 분석 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationSettings {
    /// 이 시간 동안 새 라인이 없으면 출력이 끝난 것으로 봅니다.
    pub quiet_period: Duration,
    /// 첫 출력(또는 에코)을 기다리는 최대 시간. 수집 단계의 상한이기도 합니다.
    pub response_timeout: Duration,
    /// 명령 에코 패턴 (`{command}` 자리표시자 포함)
    pub echo_pattern: Option<String>,
}

/// 상관 분석 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    /// 명령에 귀속된 출력 라인
    Output(Vec<String>),
    /// 응답 대기 시간 안에 출력(또는 에코)이 없음
    NoOutput,
}

enum Received {
    Line(OutputLine),
    Deadline,
    Closed,
}

/// 출력 상관 분석기
#[derive(Debug, Clone)]
pub struct Correlator {
    settings: CorrelationSettings,
}

impl Correlator {
    pub fn new(settings: CorrelationSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CorrelationSettings {
        &self.settings
    }

    /// 명령별 에코 정규식. 컴파일에 실패하면 quiet period 전략으로 대체합니다.
    fn echo_regex(&self, command: &str) -> Option<Regex> {
        let pattern = self.settings.echo_pattern.as_deref()?;
        let pattern = pattern.replace(ECHO_PLACEHOLDER, &regex::escape(command));
        match Regex::new(&pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "invalid echo pattern, falling back to quiet period");
                None
            }
        }
    }

    /// `rx`에서 `command`에 귀속되는 출력을 수집합니다.
    ///
    /// `rx`는 명령을 전송하기 전에 구독한 것이어야 전송 직후의 출력을 놓치지 않습니다.
    pub async fn collect(
        &self,
        rx: &mut broadcast::Receiver<OutputLine>,
        command: &str,
    ) -> Correlation {
        let echo = self.echo_regex(command);
        let first_deadline = Instant::now() + self.settings.response_timeout;
        let mut lines = Vec::new();

        loop {
            match recv_until(rx, first_deadline).await {
                Received::Line(line) => match &echo {
                    Some(re) if re.is_match(&line.text) => break,
                    Some(_) => {
                        tracing::trace!(line = %line.text, "ignoring output before command echo");
                    }
                    None => {
                        lines.push(line.text);
                        break;
                    }
                },
                Received::Deadline | Received::Closed => {
                    tracing::debug!(command, "no output attributed to command");
                    return Correlation::NoOutput;
                }
            }
        }

        let hard_deadline = Instant::now() + self.settings.response_timeout;
        while lines.len() < MAX_RESULT_LINES {
            let quiet_deadline = (Instant::now() + self.settings.quiet_period).min(hard_deadline);
            match recv_until(rx, quiet_deadline).await {
                Received::Line(line) => lines.push(line.text),
                Received::Deadline | Received::Closed => break,
            }
        }
        if lines.len() >= MAX_RESULT_LINES {
            tracing::warn!(command, max = MAX_RESULT_LINES, "command output truncated");
        }

        Correlation::Output(lines)
    }
}

async fn recv_until(rx: &mut broadcast::Receiver<OutputLine>, deadline: Instant) -> Received {
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Err(_) => return Received::Deadline,
            Ok(Ok(line)) => return Received::Line(line),
            Ok(Err(RecvError::Lagged(skipped))) => {
                tracing::warn!(skipped, "correlator lagged behind server output");
            }
            Ok(Err(RecvError::Closed)) => return Received::Closed,
        }
    }
}
