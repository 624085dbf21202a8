//! Module registry ordering: consumers start first, producers stop first.

use warden_core::pipeline::HealthStatus;
use warden_daemon::health::{ModuleHealth, aggregate_status};
use warden_daemon::modules::{ModuleHandle, ModuleRegistry};

use crate::helpers::mock_pipeline::*;

fn registry(log: &CallLog) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    for name in ["log-pipeline", "supervisor", "command-queue"] {
        registry.register(ModuleHandle::new(
            name,
            Box::new(MockPipeline::healthy(name, log)),
        ));
    }
    registry
}

#[tokio::test]
async fn modules_start_in_order_and_stop_in_reverse() {
    let log = call_log();
    let mut registry = registry(&log);

    registry.start_all().await.unwrap();
    registry.stop_all().await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "start:log-pipeline",
            "start:supervisor",
            "start:command-queue",
            "stop:command-queue",
            "stop:supervisor",
            "stop:log-pipeline",
        ]
    );
}

#[tokio::test]
async fn stop_all_without_start_stops_nothing() {
    let log = call_log();
    let mut registry = registry(&log);
    registry.stop_all().await.unwrap();
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn all_healthy_modules_aggregate_to_healthy() {
    let log = call_log();
    let mut registry = registry(&log);
    registry.start_all().await.unwrap();

    let modules: Vec<ModuleHealth> = registry
        .health_statuses()
        .await
        .into_iter()
        .map(|(name, status)| ModuleHealth { name, status })
        .collect();
    assert_eq!(modules.len(), 3);
    assert_eq!(aggregate_status(&modules), HealthStatus::Healthy);
    assert_eq!(
        registry.names(),
        vec!["log-pipeline", "supervisor", "command-queue"]
    );
}
