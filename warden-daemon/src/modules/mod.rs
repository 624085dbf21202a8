//! Module registry and initialization.
//!
//! Each warden crate is wrapped as a [`ModuleHandle`] that provides
//! uniform lifecycle management via the [`DynPipeline`] trait.
//!
//! The [`ModuleRegistry`] tracks all registered modules and supports
//! ordered start/stop operations.

pub mod command_queue;
pub mod log_pipeline;
pub mod supervisor;

use warden_core::pipeline::{DynPipeline, HealthStatus};

/// A handle to a registered module.
pub struct ModuleHandle {
    /// Module name for logging and health reporting.
    pub name: String,
    /// The module's pipeline implementation (start/stop/health_check).
    pub pipeline: Box<dyn DynPipeline>,
}

impl ModuleHandle {
    pub fn new(name: impl Into<String>, pipeline: Box<dyn DynPipeline>) -> Self {
        Self {
            name: name.into(),
            pipeline,
        }
    }

    pub async fn health_check(&self) -> HealthStatus {
        self.pipeline.health_check().await
    }
}

/// Registry of all warden modules.
///
/// Modules are registered consumers first: the log pipeline must be
/// draining the line channel before the supervisor spawns the server,
/// and the dispatcher needs a running server to send to.
pub struct ModuleRegistry {
    modules: Vec<ModuleHandle>,
    /// Number of modules started by the last `start_all`.
    started: usize,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            started: 0,
        }
    }

    pub fn register(&mut self, handle: ModuleHandle) {
        self.modules.push(handle);
    }

    /// Start all modules in registration order.
    ///
    /// Returns an error on the first module that fails to start.
    /// Already-started modules are NOT rolled back; the caller should
    /// invoke `stop_all`, which only stops modules that did start.
    pub async fn start_all(&mut self) -> anyhow::Result<()> {
        self.started = 0;
        for handle in &mut self.modules {
            tracing::info!(module = %handle.name, "starting module");
            handle
                .pipeline
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start module '{}': {}", handle.name, e))?;
            self.started += 1;
            tracing::info!(module = %handle.name, "module started");
        }
        Ok(())
    }

    /// Stop started modules in reverse registration order.
    ///
    /// Logs errors but continues stopping remaining modules.
    pub async fn stop_all(&mut self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        for handle in self.modules[..self.started].iter_mut().rev() {
            tracing::info!(module = %handle.name, "stopping module");
            if let Err(e) = handle.pipeline.stop().await {
                tracing::error!(module = %handle.name, error = %e, "failed to stop module");
                errors.push(format!("{}: {}", handle.name, e));
            } else {
                tracing::info!(module = %handle.name, "module stopped");
            }
        }
        self.started = 0;

        if !errors.is_empty() {
            return Err(anyhow::anyhow!(
                "errors stopping modules: {}",
                errors.join("; ")
            ));
        }

        Ok(())
    }

    /// Health status for every module, in registration order.
    pub async fn health_statuses(&self) -> Vec<(String, HealthStatus)> {
        let mut statuses = Vec::with_capacity(self.modules.len());
        for handle in &self.modules {
            statuses.push((handle.name.clone(), handle.health_check().await));
        }
        statuses
    }

    pub fn count(&self) -> usize {
        self.modules.len()
    }

    /// Module names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
