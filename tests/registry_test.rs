mod common;

use common::{probed_service, MockRuntime};
use isvcs::{Error, Registry};
use std::sync::Arc;
use std::time::Duration;

fn service(name: &str, runtime: &Arc<MockRuntime>) -> isvcs::ServiceDefinition {
    probed_service(name, Arc::clone(runtime), Duration::from_secs(1), 3)
}

#[test]
fn registration_order_is_preserved() {
    let runtime = MockRuntime::new();
    let mut registry = Registry::new();
    registry.register(service("coordinator", &runtime)).unwrap();
    registry.register(service("search-index", &runtime)).unwrap();
    registry.register(service("dashboard", &runtime)).unwrap();

    assert_eq!(
        registry.names(),
        vec!["coordinator", "search-index", "dashboard"]
    );
    let all = registry.all();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].name(), "coordinator");
    assert_eq!(all[2].name(), "dashboard");
}

#[test]
fn duplicate_registration_fails_and_first_wins() {
    let runtime = MockRuntime::new();
    let mut registry = Registry::new();

    let first = probed_service("coordinator", Arc::clone(&runtime), Duration::from_secs(7), 3);
    registry.register(first).unwrap();

    let second = probed_service("coordinator", Arc::clone(&runtime), Duration::from_secs(99), 3);
    let err = registry.register(second).unwrap_err();
    assert!(matches!(err, Error::DuplicateService(name) if name == "coordinator"));

    // The first registration is untouched.
    assert_eq!(registry.len(), 1);
    let kept = registry.lookup("coordinator").unwrap();
    assert_eq!(kept.startup_timeout(), Duration::from_secs(7));
}

#[test]
fn lookup_misses_return_none() {
    let runtime = MockRuntime::new();
    let mut registry = Registry::new();
    registry.register(service("coordinator", &runtime)).unwrap();

    assert!(registry.lookup("coordinator").is_some());
    assert!(registry.lookup("dashboard").is_none());
}

#[test]
fn subset_names_first_unknown() {
    let runtime = MockRuntime::new();
    let mut registry = Registry::new();
    registry.register(service("a", &runtime)).unwrap();

    let err = registry.subset(&["a", "missing", "also-missing"]).unwrap_err();
    assert!(matches!(err, Error::UnknownService(name) if name == "missing"));
}

#[test]
fn subset_returns_registration_order() {
    let runtime = MockRuntime::new();
    let mut registry = Registry::new();
    registry.register(service("a", &runtime)).unwrap();
    registry.register(service("b", &runtime)).unwrap();
    registry.register(service("c", &runtime)).unwrap();

    // Request order doesn't override dependency (registration) order.
    let subset = registry.subset(&["c", "a"]).unwrap();
    let names: Vec<&str> = subset.iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["a", "c"]);

    // Duplicate requests collapse.
    let subset = registry.subset(&["b", "b"]).unwrap();
    assert_eq!(subset.len(), 1);
}
