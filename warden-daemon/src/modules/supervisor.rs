//! Supervisor module initialization.
//!
//! Converts `WardenConfig.server` into a `SupervisorConfig` and builds the
//! `ServerSupervisor`. The returned clone shares state with the registered
//! handle and is used as the dispatcher's line sink.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use warden_core::bus::EventBus;
use warden_core::config::WardenConfig;
use warden_core::types::OutputLine;
use warden_supervisor::{ServerSupervisor, SupervisorConfig};

use super::ModuleHandle;

/// Initialize the supervisor module.
pub fn init(
    config: &WardenConfig,
    bus: Arc<EventBus>,
    line_tx: mpsc::Sender<OutputLine>,
) -> Result<(ModuleHandle, ServerSupervisor)> {
    tracing::info!(executable = %config.server.executable, "initializing supervisor");

    let supervisor_config = SupervisorConfig::from_core(&config.server);
    supervisor_config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid supervisor config: {}", e))?;

    let supervisor = ServerSupervisor::new(supervisor_config, bus, line_tx);
    let handle = ModuleHandle::new("supervisor", Box::new(supervisor.clone()));
    Ok((handle, supervisor))
}
