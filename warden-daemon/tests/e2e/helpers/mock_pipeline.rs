//! Mock pipeline implementations for registry lifecycle tests.
//!
//! Provides configurable mock pipelines that implement `DynPipeline`
//! for testing start/stop ordering and fault isolation.

use std::sync::{Arc, Mutex};

use warden_core::error::WardenError;
use warden_core::pipeline::{BoxFuture, DynPipeline, HealthStatus};

/// Shared log of lifecycle calls across several mock pipelines.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A mock pipeline that records start/stop calls and supports failure injection.
pub struct MockPipeline {
    name: String,
    health: HealthStatus,
    start_error: Option<String>,
    stop_error: Option<String>,
    log: CallLog,
}

#[allow(dead_code)]
impl MockPipeline {
    pub fn healthy(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_owned(),
            health: HealthStatus::Healthy,
            start_error: None,
            stop_error: None,
            log: Arc::clone(log),
        }
    }

    pub fn failing_start(name: &str, log: &CallLog, error: &str) -> Self {
        Self {
            start_error: Some(error.to_owned()),
            health: HealthStatus::Unhealthy(error.to_owned()),
            ..Self::healthy(name, log)
        }
    }

    pub fn failing_stop(name: &str, log: &CallLog, error: &str) -> Self {
        Self {
            stop_error: Some(error.to_owned()),
            ..Self::healthy(name, log)
        }
    }

    pub fn with_health(name: &str, log: &CallLog, health: HealthStatus) -> Self {
        Self {
            health,
            ..Self::healthy(name, log)
        }
    }
}

impl DynPipeline for MockPipeline {
    fn start(&mut self) -> BoxFuture<'_, Result<(), WardenError>> {
        Box::pin(async move {
            if let Some(msg) = &self.start_error {
                return Err(WardenError::Pipeline(msg.clone()));
            }
            self.log
                .lock()
                .unwrap()
                .push(format!("start:{}", self.name));
            Ok(())
        })
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), WardenError>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(format!("stop:{}", self.name));
            match &self.stop_error {
                Some(msg) => Err(WardenError::Pipeline(msg.clone())),
                None => Ok(()),
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        let health = self.health.clone();
        Box::pin(async move { health })
    }
}
