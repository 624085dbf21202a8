//! Module fault isolation: one failing module must not leave others running
//! or hide their errors.

use warden_core::pipeline::HealthStatus;
use warden_daemon::health::{ModuleHealth, aggregate_status};
use warden_daemon::modules::{ModuleHandle, ModuleRegistry};

use crate::helpers::mock_pipeline::*;

#[tokio::test]
async fn start_failure_stops_only_started_modules() {
    let log = call_log();
    let mut registry = ModuleRegistry::new();
    registry.register(ModuleHandle::new(
        "log-pipeline",
        Box::new(MockPipeline::healthy("log-pipeline", &log)),
    ));
    registry.register(ModuleHandle::new(
        "supervisor",
        Box::new(MockPipeline::failing_start("supervisor", &log, "spawn failed")),
    ));
    registry.register(ModuleHandle::new(
        "command-queue",
        Box::new(MockPipeline::healthy("command-queue", &log)),
    ));

    let err = registry.start_all().await.unwrap_err();
    assert!(err.to_string().contains("supervisor"));
    assert!(err.to_string().contains("spawn failed"));

    registry.stop_all().await.unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["start:log-pipeline", "stop:log-pipeline"]
    );
}

#[tokio::test]
async fn stop_failure_continues_with_remaining_modules() {
    let log = call_log();
    let mut registry = ModuleRegistry::new();
    registry.register(ModuleHandle::new(
        "log-pipeline",
        Box::new(MockPipeline::healthy("log-pipeline", &log)),
    ));
    registry.register(ModuleHandle::new(
        "supervisor",
        Box::new(MockPipeline::failing_stop("supervisor", &log, "stop timed out")),
    ));

    registry.start_all().await.unwrap();
    let err = registry.stop_all().await.unwrap_err();

    assert!(err.to_string().contains("supervisor: "));
    assert!(log.lock().unwrap().contains(&"stop:log-pipeline".to_owned()));
}

#[tokio::test]
async fn crashed_server_makes_daemon_unhealthy() {
    let log = call_log();
    let mut registry = ModuleRegistry::new();
    registry.register(ModuleHandle::new(
        "log-pipeline",
        Box::new(MockPipeline::healthy("log-pipeline", &log)),
    ));
    registry.register(ModuleHandle::new(
        "supervisor",
        Box::new(MockPipeline::with_health(
            "supervisor",
            &log,
            HealthStatus::Unhealthy("server crashed".to_owned()),
        )),
    ));
    registry.register(ModuleHandle::new(
        "command-queue",
        Box::new(MockPipeline::with_health(
            "command-queue",
            &log,
            HealthStatus::Degraded("slow".to_owned()),
        )),
    ));

    let modules: Vec<ModuleHealth> = registry
        .health_statuses()
        .await
        .into_iter()
        .map(|(name, status)| ModuleHealth { name, status })
        .collect();

    assert_eq!(
        aggregate_status(&modules),
        HealthStatus::Unhealthy("supervisor: server crashed; command-queue: slow".to_owned())
    );
}
