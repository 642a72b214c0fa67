//! Health-monitor behavior observed through the supervisor: degradation
//! ordering, recovery, and wholesale health-result replacement.

mod common;

use common::{probe_token, probed_service, wait_for_phase, MockRuntime, TICK};
use isvcs::{Manager, Phase, Registry};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn single_service_manager(
    name: &str,
    runtime: &Arc<MockRuntime>,
    threshold: u32,
) -> Manager {
    let mut registry = Registry::new();
    registry
        .register(probed_service(name, Arc::clone(runtime), TICK * 10, threshold))
        .unwrap();
    Manager::builder(registry).build()
}

#[tokio::test]
async fn running_service_degrades_before_failing() {
    let runtime = MockRuntime::new();
    let manager = single_service_manager("coordinator", &runtime, 3);
    manager.start_all().await.unwrap();

    runtime.set_probe_exit(&probe_token("coordinator"), 1);

    // Record every phase observed on the way down.
    let mut seen = Vec::new();
    let deadline = Instant::now() + TICK * 20;
    loop {
        let phase = manager.status()["coordinator"].phase;
        if seen.last() != Some(&phase) {
            seen.push(phase);
        }
        if phase == Phase::Failed || Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(3)).await;
    }

    assert_eq!(*seen.last().unwrap(), Phase::Failed, "observed: {:?}", seen);
    let degraded_at = seen.iter().position(|p| *p == Phase::Degraded);
    let failed_at = seen.iter().position(|p| *p == Phase::Failed);
    assert!(
        degraded_at.is_some() && degraded_at < failed_at,
        "Degraded must precede Failed: {:?}",
        seen
    );
}

#[tokio::test]
async fn degraded_service_recovers_to_running() {
    let runtime = MockRuntime::new();
    let manager = single_service_manager("search-index", &runtime, 10);
    manager.start_all().await.unwrap();

    runtime.set_probe_exit(&probe_token("search-index"), 1);
    assert!(wait_for_phase(&manager, "search-index", Phase::Degraded, TICK * 20).await);

    runtime.set_probe_exit(&probe_token("search-index"), 0);
    assert!(wait_for_phase(&manager, "search-index", Phase::Running, TICK * 20).await);
}

#[tokio::test]
async fn health_result_is_replaced_each_cycle() {
    let runtime = MockRuntime::new();
    let manager = single_service_manager("metrics-store", &runtime, 3);
    manager.start_all().await.unwrap();

    let first = manager.status()["metrics-store"].health.clone().unwrap();
    tokio::time::sleep(TICK * 3).await;
    let later = manager.status()["metrics-store"].health.clone().unwrap();

    assert!(later.checked_at > first.checked_at);
    assert_eq!(later.service, "metrics-store");
    assert!(later.is_healthy());
}

#[tokio::test]
async fn failed_check_detail_is_visible_in_status() {
    let runtime = MockRuntime::new();
    let manager = single_service_manager("log-pipeline", &runtime, 10);
    manager.start_all().await.unwrap();

    runtime.set_probe_exit(&probe_token("log-pipeline"), 7);
    assert!(wait_for_phase(&manager, "log-pipeline", Phase::Degraded, TICK * 20).await);

    let health = manager.status()["log-pipeline"].health.clone().unwrap();
    assert!(!health.is_healthy());
    let failure = health.failures().next().unwrap();
    assert_eq!(failure.name, "probe");
    assert!(failure.message.contains("exit code 7"), "{}", failure.message);
}

#[tokio::test]
async fn service_without_checks_is_vacuously_healthy() {
    let runtime = MockRuntime::new();
    let mut registry = Registry::new();
    registry
        .register(
            isvcs::ServiceDefinition::builder(
                "dashboard",
                "isvcs/dashboard:v1".parse().unwrap(),
                Arc::clone(&runtime) as Arc<dyn isvcs::runtime::ContainerRuntime>,
            )
            .interval(TICK)
            .startup_timeout(TICK * 10)
            .build(),
        )
        .unwrap();
    let manager = Manager::builder(registry).build();

    let summary = manager.start_all().await.unwrap();
    assert!(summary.all_running());
    assert_eq!(manager.status()["dashboard"].phase, Phase::Running);
}

#[tokio::test]
async fn never_healthy_service_fails_at_startup_deadline() {
    let runtime = MockRuntime::new();
    let mut registry = Registry::new();
    registry
        .register(probed_service("stuck", Arc::clone(&runtime), TICK * 3, 3))
        .unwrap();
    runtime.set_probe_exit(&probe_token("stuck"), 1);

    let manager = Manager::builder(registry).build();
    let summary = manager.start_all().await.unwrap();

    assert_eq!(summary.get("stuck").unwrap().phase, Phase::Failed);
    assert_eq!(manager.status()["stuck"].phase, Phase::Failed);

    // The abandoned attempt left its last health result in place.
    let health = manager.status()["stuck"].health.clone().unwrap();
    assert!(!health.is_healthy());
}
