//! Command queue module initialization.
//!
//! Builds the `CommandDispatcher` that polls the on-disk queue and sends
//! commands through the supervisor.

use std::sync::Arc;

use anyhow::Result;

use warden_command_queue::{CommandDispatcherBuilder, CommandQueueConfig};
use warden_core::bus::EventBus;
use warden_core::config::WardenConfig;
use warden_core::pipeline::LineSink;
use warden_log_pipeline::LogParser;

use super::ModuleHandle;

/// Initialize the command queue dispatcher module.
pub fn init(
    config: &WardenConfig,
    sink: Arc<dyn LineSink>,
    parser: Arc<LogParser>,
    bus: Arc<EventBus>,
) -> Result<ModuleHandle> {
    tracing::info!(dir = %config.queue.dir, "initializing command queue");

    let dispatcher = CommandDispatcherBuilder::new()
        .config(CommandQueueConfig::from_core(&config.queue))
        .sink(sink)
        .parser(parser)
        .bus(bus)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build command dispatcher: {}", e))?;

    Ok(ModuleHandle::new("command-queue", Box::new(dispatcher)))
}
