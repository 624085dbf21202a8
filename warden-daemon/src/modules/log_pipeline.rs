//! Log pipeline module initialization.
//!
//! Loads the line rules, builds the `LogPipeline` on the shared bus and
//! hands back the pieces other modules are wired to.
//!
//! # Channel Wiring
//!
//! ```text
//! supervisor --OutputLine--> line_tx --> LogPipeline --Event--> EventBus
//!                                            └──broadcast──> dispatcher (Correlator)
//! ```

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use warden_core::bus::EventBus;
use warden_core::config::WardenConfig;
use warden_core::types::OutputLine;
use warden_log_pipeline::{LogParser, LogPipelineBuilder, PipelineConfig, RuleEngine};

use super::ModuleHandle;

/// Initialized log pipeline with the handles other modules need.
pub struct LogPipelineModule {
    pub handle: ModuleHandle,
    /// Parser shared with the dispatcher for output correlation.
    pub parser: Arc<LogParser>,
    /// Sender the supervisor forwards server output into.
    pub line_tx: mpsc::Sender<OutputLine>,
}

/// Initialize the log pipeline module.
pub async fn init(config: &WardenConfig, bus: Arc<EventBus>) -> Result<LogPipelineModule> {
    tracing::info!("initializing log pipeline");

    let pipeline_config = PipelineConfig::from_core(&config.log_pipeline);
    let engine = RuleEngine::load(&pipeline_config.rules_path, pipeline_config.builtin_rules)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load line rules: {}", e))?;
    tracing::info!(
        rules = engine.rule_count(),
        skipped = engine.skipped().len(),
        "line rules loaded"
    );

    let (pipeline, line_tx) = LogPipelineBuilder::new()
        .config(pipeline_config)
        .rule_engine(engine)
        .bus(bus)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;
    let line_tx =
        line_tx.ok_or_else(|| anyhow::anyhow!("log pipeline did not create a line channel"))?;
    let parser = pipeline.parser();

    Ok(LogPipelineModule {
        handle: ModuleHandle::new("log-pipeline", Box::new(pipeline)),
        parser,
        line_tx,
    })
}
