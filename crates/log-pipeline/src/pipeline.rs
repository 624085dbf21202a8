//! 파이프라인 오케스트레이션 -- 라인 수신 태스크의 생명주기를 관리합니다.
//!
//! [`LogPipeline`]은 core의 [`Pipeline`](warden_core::pipeline::Pipeline) trait을 구현하여
//! `warden-daemon`에서 다른 모듈과 동일한 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! Supervisor readers -> mpsc<OutputLine> -> LogParser -> EventBus
//!                                              └──────> broadcast -> Correlator
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use warden_core::bus::EventBus;
use warden_core::error::WardenError;
use warden_core::pipeline::{HealthStatus, Pipeline};
use warden_core::types::OutputLine;

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::parser::LogParser;
use crate::rule::RuleEngine;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

impl PipelineState {
    fn name(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

/// 로그 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use warden_log_pipeline::{LogPipelineBuilder, RuleEngine};
///
/// let (mut pipeline, line_tx) = LogPipelineBuilder::new()
///     .config(config)
///     .rule_engine(RuleEngine::with_default_rules())
///     .bus(bus)
///     .build()?;
///
/// pipeline.start().await?;
/// // line_tx 를 수퍼바이저에 전달
/// ```
pub struct LogPipeline {
    /// 현재 상태
    state: PipelineState,
    /// 파서 (상관 분석기와 공유)
    parser: Arc<LogParser>,
    /// 라인 수신 채널 (start 시 태스크로 이동)
    line_rx: Option<mpsc::Receiver<OutputLine>>,
    /// 태스크 종료 토큰
    cancel: CancellationToken,
    /// 수신 태스크 핸들
    task: Option<JoinHandle<()>>,
    /// 처리된 라인 카운터
    processed: Arc<AtomicU64>,
}

impl LogPipeline {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        self.state.name()
    }

    /// 처리된 라인 수를 반환합니다.
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// 로드된 규칙 수를 반환합니다.
    pub fn rule_count(&self) -> usize {
        self.parser.engine().rule_count()
    }

    /// 파서 핸들을 반환합니다. 라인 구독이나 최근 라인 조회에 사용합니다.
    pub fn parser(&self) -> Arc<LogParser> {
        Arc::clone(&self.parser)
    }
}

impl Pipeline for LogPipeline {
    async fn start(&mut self) -> Result<(), WardenError> {
        if self.state == PipelineState::Running {
            return Err(LogPipelineError::InvalidState {
                state: self.state.name(),
                action: "start",
            }
            .into());
        }

        // 수신 채널은 한 번만 소비됩니다. 재시작하려면 새 인스턴스를 빌드해야 합니다.
        let mut line_rx = self.line_rx.take().ok_or_else(|| {
            LogPipelineError::Channel("line receiver already consumed".to_owned())
        })?;

        tracing::info!(rules = self.rule_count(), "starting log pipeline");

        let parser = Arc::clone(&self.parser);
        let cancel = self.cancel.clone();
        let processed = Arc::clone(&self.processed);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        // 이미 채널에 들어온 라인은 처리하고 종료
                        let mut drained = 0u64;
                        while let Ok(line) = line_rx.try_recv() {
                            parser.ingest(line);
                            drained += 1;
                        }
                        processed.fetch_add(drained, Ordering::Relaxed);
                        if drained > 0 {
                            tracing::info!(count = drained, "drained remaining lines");
                        }
                        break;
                    }
                    line = line_rx.recv() => match line {
                        Some(line) => {
                            parser.ingest(line);
                            processed.fetch_add(1, Ordering::Relaxed);
                        }
                        None => {
                            tracing::info!("line channel closed, stopping log pipeline loop");
                            break;
                        }
                    },
                }
            }
        });

        self.task = Some(task);
        self.state = PipelineState::Running;
        tracing::info!("log pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), WardenError> {
        if self.state != PipelineState::Running {
            return Err(LogPipelineError::InvalidState {
                state: self.state.name(),
                action: "stop",
            }
            .into());
        }

        tracing::info!("stopping log pipeline");
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "log pipeline task panicked");
            }
        }

        self.state = PipelineState::Stopped;
        tracing::info!(processed = self.processed_count(), "log pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.task.as_ref().is_some_and(JoinHandle::is_finished) {
                    HealthStatus::Degraded("line channel closed".to_owned())
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 로그 파이프라인 빌더
///
/// 파이프라인을 구성하고 필요한 채널을 생성합니다.
pub struct LogPipelineBuilder {
    config: PipelineConfig,
    engine: Option<RuleEngine>,
    bus: Option<Arc<EventBus>>,
    line_rx: Option<mpsc::Receiver<OutputLine>>,
}

impl LogPipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            engine: None,
            bus: None,
            line_rx: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 규칙 엔진을 지정합니다. 지정하지 않으면 규칙 없는 엔진을 사용합니다.
    pub fn rule_engine(mut self, engine: RuleEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// 이벤트 버스를 지정합니다. 지정하지 않으면 새 버스를 생성합니다.
    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// 외부 라인 수신 채널을 설정합니다.
    ///
    /// 설정하지 않으면 빌더가 새 채널을 생성하고 송신측을 반환합니다.
    pub fn line_receiver(mut self, rx: mpsc::Receiver<OutputLine>) -> Self {
        self.line_rx = Some(rx);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Returns
    /// - `LogPipeline`: 파이프라인 인스턴스
    /// - `Option<mpsc::Sender<OutputLine>>`: 라인 송신 채널
    ///   (외부 line_receiver를 설정한 경우 None)
    pub fn build(
        self,
    ) -> Result<(LogPipeline, Option<mpsc::Sender<OutputLine>>), LogPipelineError> {
        self.config.validate()?;

        let (line_rx, line_tx) = match self.line_rx {
            Some(rx) => (rx, None),
            None => {
                let (tx, rx) = mpsc::channel(self.config.line_channel_capacity);
                (rx, Some(tx))
            }
        };

        let bus = self.bus.unwrap_or_else(|| Arc::new(EventBus::new()));
        let engine = self.engine.unwrap_or_default();
        let parser = LogParser::new(engine, bus, self.config.recent_lines_capacity);

        let pipeline = LogPipeline {
            state: PipelineState::Initialized,
            parser: Arc::new(parser),
            line_rx: Some(line_rx),
            cancel: CancellationToken::new(),
            task: None,
            processed: Arc::new(AtomicU64::new(0)),
        };

        Ok((pipeline, line_tx))
    }
}

impl Default for LogPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
