//! Aggregated health check reporting.
//!
//! Polls each module's `health_check()` and produces a unified
//! [`DaemonHealth`] report. The overall daemon status is the worst
//! status among all modules.
//!
//! # Aggregation Rule
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)

use warden_core::pipeline::HealthStatus;
use warden_core::types::ProcessState;

/// Aggregated health report for the entire daemon.
#[derive(Debug, Clone)]
pub struct DaemonHealth {
    /// Overall daemon health status (worst of all modules).
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// State of the supervised server process.
    pub server_state: ProcessState,
    /// Per-module health reports.
    pub modules: Vec<ModuleHealth>,
}

/// Health status for a single module.
#[derive(Debug, Clone)]
pub struct ModuleHealth {
    /// Module name (e.g., "supervisor", "log-pipeline").
    pub name: String,
    /// Current health status of the module.
    pub status: HealthStatus,
}

/// Aggregate multiple module health statuses into a single status.
///
/// Returns the worst status found: Unhealthy > Degraded > Healthy.
/// Reasons of every non-healthy module are joined with `; `.
pub fn aggregate_status(modules: &[ModuleHealth]) -> HealthStatus {
    let mut worst = HealthStatus::Healthy;
    let mut reasons = Vec::new();

    for module in modules {
        match &module.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => {
                reasons.push(format!("{}: {}", module.name, reason));
                if !worst.is_unhealthy() {
                    worst = HealthStatus::Degraded(String::new());
                }
            }
            HealthStatus::Unhealthy(reason) => {
                reasons.push(format!("{}: {}", module.name, reason));
                worst = HealthStatus::Unhealthy(String::new());
            }
        }
    }

    match worst {
        HealthStatus::Healthy => HealthStatus::Healthy,
        HealthStatus::Degraded(_) => HealthStatus::Degraded(reasons.join("; ")),
        HealthStatus::Unhealthy(_) => HealthStatus::Unhealthy(reasons.join("; ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str, status: HealthStatus) -> ModuleHealth {
        ModuleHealth {
            name: name.to_owned(),
            status,
        }
    }

    #[test]
    fn empty_registry_is_healthy() {
        assert_eq!(aggregate_status(&[]), HealthStatus::Healthy);
    }

    #[test]
    fn degraded_module_degrades_daemon() {
        let status = aggregate_status(&[
            module("log-pipeline", HealthStatus::Healthy),
            module("supervisor", HealthStatus::Degraded("server is starting".into())),
        ]);
        assert_eq!(
            status,
            HealthStatus::Degraded("supervisor: server is starting".into())
        );
    }

    #[test]
    fn unhealthy_wins_and_keeps_all_reasons() {
        let status = aggregate_status(&[
            module("supervisor", HealthStatus::Degraded("server is stopping".into())),
            module("command-queue", HealthStatus::Unhealthy("dispatcher task exited".into())),
        ]);
        assert_eq!(
            status,
            HealthStatus::Unhealthy(
                "supervisor: server is stopping; command-queue: dispatcher task exited".into()
            )
        );
    }
}
