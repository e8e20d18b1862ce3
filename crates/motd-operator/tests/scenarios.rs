//! End-to-end scenarios through the public API: dispatcher, reconciler,
//! in-memory supervisor and a status file.

use std::sync::Arc;

use motd_core::{CharmConfig, OperatorHealth};
use motd_operator::declaration::{motd_layer, LAYER_LABEL, SERVICE_COMMAND, SERVICE_NAME};
use motd_operator::{Dispatcher, FileReporter, HookEvent, Reconciler};
use motd_pebble::{MemorySupervisor, MemorySupervisorConfig, Plan, Supervisor};

fn setup(
    workload: Arc<MemorySupervisor>,
) -> (Dispatcher, Arc<FileReporter>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let reporter = Arc::new(FileReporter::new(dir.path().join("status.json")));
    let reconciler = Reconciler::new(CharmConfig::default(), reporter.clone());
    let dispatcher = Dispatcher::new("httpbin", reconciler, move |_| {
        workload.clone() as Arc<dyn Supervisor>
    });
    (dispatcher, reporter, dir)
}

fn pebble_ready() -> HookEvent {
    HookEvent::parse("hooks/httpbin-pebble-ready").unwrap()
}

#[tokio::test]
async fn test_fresh_container() {
    let workload = Arc::new(MemorySupervisor::new());
    let (dispatcher, reporter, _dir) = setup(workload.clone());

    dispatcher.dispatch(&pebble_ready()).await.unwrap();

    let plan = workload.plan().await.unwrap();
    assert_eq!(plan.services.len(), 1);
    assert_eq!(plan.services[SERVICE_NAME].command, SERVICE_COMMAND);
    assert!(plan.services[SERVICE_NAME].is_enabled());
    assert_eq!(reporter.load().unwrap().unwrap().health, OperatorHealth::Active);
}

#[tokio::test]
async fn test_rerun_after_supervisor_restart() {
    let mut prior = Plan::new();
    prior.add_layer(LAYER_LABEL, motd_layer(), true).unwrap();
    let workload = Arc::new(MemorySupervisor::with_plan(prior.clone()));
    let (dispatcher, reporter, _dir) = setup(workload.clone());

    dispatcher.dispatch(&pebble_ready()).await.unwrap();
    dispatcher.dispatch(&pebble_ready()).await.unwrap();

    assert_eq!(workload.layered_plan(), prior);
    assert_eq!(workload.plan().await.unwrap().services.len(), 1);
    assert_eq!(workload.start_count(), 1);
    assert_eq!(reporter.load().unwrap().unwrap().health, OperatorHealth::Active);
}

#[tokio::test]
async fn test_supervisor_unreachable() {
    let workload = Arc::new(MemorySupervisor::with_config(MemorySupervisorConfig {
        unreachable: true,
        ..Default::default()
    }));
    let (dispatcher, reporter, _dir) = setup(workload.clone());

    assert!(dispatcher.dispatch(&pebble_ready()).await.is_err());

    assert!(workload.layered_plan().layers().is_empty());
    assert!(workload.running().is_empty());
    let saved = reporter.load().unwrap().unwrap();
    assert_eq!(saved.health, OperatorHealth::Error);
    assert!(saved.message.contains("unavailable"));
}
