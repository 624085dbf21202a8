//! Module orchestration -- assembly, wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `warden-daemon`.
//! It creates the shared event bus, builds every module, manages
//! startup/shutdown ordering, and runs the main loop.
//!
//! # Startup Order (consumers before producers)
//!
//! 1. Log Pipeline (drains the line channel, publishes events)
//! 2. Supervisor (spawns the server, produces output lines)
//! 3. Command Queue (sends queued commands to the running server)
//!
//! # Shutdown Order (reverse)
//!
//! 1. Command Queue (in-flight command is marked Failed)
//! 2. Supervisor (graceful stop, final output still reaches the pipeline)
//! 3. Log Pipeline (drains remaining lines)

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::broadcast;

use warden_core::bus::{ANY_KIND, EventBus, EventHandler, RegisterOptions, RegistrationId};
use warden_core::config::WardenConfig;
use warden_core::event::{
    Event, EventSource, FIELD_EXIT_CODE, FIELD_STDERR_TAIL, KIND_RAW_LOG_LINE,
    KIND_SERVER_CRASHED, PRIORITY_MONITOR,
};
use warden_core::metrics as m;
use warden_core::pipeline::HealthStatus;
use warden_supervisor::ServerSupervisor;

use crate::health::{DaemonHealth, ModuleHealth, aggregate_status};
use crate::logging::SERVER_OUTPUT_TARGET;
use crate::metrics_server;
use crate::modules::{self, ModuleRegistry};
use crate::pid_file::{remove_pid_file, write_pid_file};

/// Seconds between aggregated health checks in the main loop.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// The main daemon orchestrator.
pub struct Orchestrator {
    config: WardenConfig,
    bus: Arc<EventBus>,
    modules: ModuleRegistry,
    supervisor: ServerSupervisor,
    /// Signals background tasks (metrics updater) to exit.
    shutdown_tx: broadcast::Sender<()>,
    start_time: Instant,
}

impl Orchestrator {
    /// Load `warden.toml`, apply environment overrides and build.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = WardenConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: WardenConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let bus = Arc::new(EventBus::new());
        register_event_logger(&bus)?;

        let mut modules = ModuleRegistry::new();

        let log = modules::log_pipeline::init(&config, Arc::clone(&bus)).await?;
        modules.register(log.handle);

        let (handle, supervisor) =
            modules::supervisor::init(&config, Arc::clone(&bus), log.line_tx)?;
        modules.register(handle);

        modules.register(modules::command_queue::init(
            &config,
            Arc::new(supervisor.clone()),
            log.parser,
            Arc::clone(&bus),
        )?);

        tracing::info!(modules = ?modules.names(), "orchestrator initialized");
        if config.metrics.enabled {
            record_daemon_metrics(modules.count());
        }

        let (shutdown_tx, _) = broadcast::channel(4);
        Ok(Self {
            config,
            bus,
            modules,
            supervisor,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start all modules and run until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        let pid_path = self.pid_path();
        if let Some(path) = &pid_path {
            write_pid_file(path)?;
        }

        if let Err(e) = self.start().await {
            if let Some(path) = &pid_path {
                remove_pid_file(path);
            }
            return Err(e);
        }

        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| {
                spawn_metrics_updater(
                    self.start_time,
                    self.supervisor.clone(),
                    self.shutdown_tx.subscribe(),
                )
            });

        tracing::info!("entering main loop");
        let signal = self.wait_for_shutdown().await?;
        tracing::info!(signal, "shutdown signal received");

        let _ = self.shutdown_tx.send(());
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        let result = self.shutdown().await;
        if let Some(path) = &pid_path {
            remove_pid_file(path);
        }
        result
    }

    /// Start all modules, rolling back the ones already started on failure.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("starting all modules");
        if let Err(e) = self.modules.start_all().await {
            tracing::warn!(error = %e, "startup failed, rolling back already-started modules");
            if let Err(stop_err) = self.modules.stop_all().await {
                tracing::error!(
                    startup_error = %e,
                    rollback_error = %stop_err,
                    "rollback also failed during startup failure cleanup"
                );
            }
            return Err(e);
        }
        Ok(())
    }

    /// Stop all modules in reverse order and close the bus.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping all modules");
        let result = self.modules.stop_all().await;
        self.bus.close();
        result
    }

    /// Current aggregated health of all modules.
    pub async fn health(&self) -> DaemonHealth {
        let modules: Vec<ModuleHealth> = self
            .modules
            .health_statuses()
            .await
            .into_iter()
            .map(|(name, status)| ModuleHealth { name, status })
            .collect();

        DaemonHealth {
            status: aggregate_status(&modules),
            uptime_secs: self.start_time.elapsed().as_secs(),
            server_state: self.supervisor.state(),
            modules,
        }
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn supervisor(&self) -> &ServerSupervisor {
        &self.supervisor
    }

    fn pid_path(&self) -> Option<PathBuf> {
        let pid_file = &self.config.general.pid_file;
        (!pid_file.is_empty()).then(|| PathBuf::from(pid_file))
    }

    /// Wait for a shutdown signal, logging aggregated health periodically.
    async fn wait_for_shutdown(&self) -> Result<&'static str> {
        let signal = shutdown_signal();
        tokio::pin!(signal);

        let mut interval = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                signal = &mut signal => return signal,
                _ = interval.tick() => {
                    let health = self.health().await;
                    match &health.status {
                        HealthStatus::Healthy => tracing::debug!(
                            uptime_secs = health.uptime_secs,
                            server = %health.server_state,
                            "daemon healthy"
                        ),
                        HealthStatus::Degraded(reason) => tracing::warn!(
                            reason = %reason,
                            server = %health.server_state,
                            "daemon degraded"
                        ),
                        HealthStatus::Unhealthy(reason) => tracing::error!(
                            reason = %reason,
                            server = %health.server_state,
                            "daemon unhealthy"
                        ),
                    }
                }
            }
        }
    }
}

/// Wait for SIGTERM or SIGINT and return the signal name.
#[cfg(unix)]
async fn shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Register a monitor handler that writes every bus event to the daemon log.
///
/// It runs after every other handler and also sees cancelled events.
///
/// Server output is logged at debug/trace under [`SERVER_OUTPUT_TARGET`], which
/// the default filter caps at info. A crash is logged as an error with the captured stderr tail.
pub fn register_event_logger(bus: &EventBus) -> Result<RegistrationId> {
    let handler = EventHandler::sync("event-logger", |event: &Event| {
        match (event.source, event.kind.as_str()) {
            (_, KIND_SERVER_CRASHED) => tracing::error!(
                exit_code = event.field(FIELD_EXIT_CODE).unwrap_or("unknown"),
                stderr_tail = event.field(FIELD_STDERR_TAIL).unwrap_or(""),
                "server crashed"
            ),
            (EventSource::Log, KIND_RAW_LOG_LINE) => {
                tracing::trace!(target: SERVER_OUTPUT_TARGET, fields = ?event.fields, "server output");
            }
            (EventSource::Log, kind) => {
                tracing::debug!(target: SERVER_OUTPUT_TARGET, kind, fields = ?event.fields, "log event");
            }
            (source, kind) => {
                tracing::info!(kind, %source, fields = ?event.fields, "event");
            }
        }
        Ok(())
    });

    bus.register_with(
        ANY_KIND,
        PRIORITY_MONITOR,
        handler,
        RegisterOptions {
            receive_cancelled: true,
        },
    )
    .map_err(|e| anyhow::anyhow!("failed to register event logger: {}", e))
}

/// Record daemon-level metrics (build info, modules registered).
fn record_daemon_metrics(module_count: usize) {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_MODULES_REGISTERED).set(module_count as f64);
}

/// Periodically update the uptime and server process gauges until shutdown.
fn spawn_metrics_updater(
    start_time: Instant,
    supervisor: ServerSupervisor,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                    // records the warden_supervisor_* process gauges as a side effect
                    if let Some(sample) = supervisor.performance_metrics() {
                        tracing::trace!(
                            cpu_percent = sample.cpu_percent,
                            memory_mb = sample.memory_mb,
                            threads = ?sample.threads,
                            "server process sampled"
                        );
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("metrics updater shutting down");
                    break;
                }
            }
        }
    })
}
