//! The platform's fixed set of infrastructure services.
//!
//! These definitions are data handed to the caller, not ambient globals:
//! build a [`Registry`] with [`default_registry`] (or a bootstrap subset
//! with [`registry_for`]) and pass it to the
//! [`Manager`](crate::supervisor::Manager). Registration order here is the
//! dependency order the control plane needs: the coordination service
//! before everything that expects it reachable, the image registry before
//! anything that pulls internal images.

use crate::definition::{ImageRef, ServiceDefinition};
use crate::error::{Error, Result};
use crate::health::spec::CheckKind;
use crate::registry::Registry;
use crate::runtime::ContainerRuntime;
use std::sync::Arc;
use std::time::Duration;

/// Distributed coordination/consensus service.
pub const COORDINATOR: &str = "coordinator";
/// Internal container-image registry.
pub const IMAGE_REGISTRY: &str = "image-registry";
/// Search-index engine backing domain entity stores and log search.
pub const SEARCH_INDEX: &str = "search-index";
/// Log-aggregation pipeline; ships service logs into the search index.
pub const LOG_PIPELINE: &str = "log-pipeline";
/// Time-series metrics store.
pub const METRICS_STORE: &str = "metrics-store";
/// Operator dashboard.
pub const DASHBOARD: &str = "dashboard";

const COORDINATOR_IMAGE: (&str, &str) = ("isvcs/coordinator", "v10");
const IMAGE_REGISTRY_IMAGE: (&str, &str) = ("isvcs/image-registry", "v5");
const SEARCH_INDEX_IMAGE: (&str, &str) = ("isvcs/search-index", "v12");
const LOG_PIPELINE_IMAGE: (&str, &str) = ("isvcs/log-pipeline", "v8");
const METRICS_STORE_IMAGE: (&str, &str) = ("isvcs/metrics-store", "v6");
const DASHBOARD_IMAGE: (&str, &str) = ("isvcs/dashboard", "v4");

/// The search index routinely takes minutes to settle on first boot.
const SEARCH_INDEX_STARTUP_TIMEOUT: Duration = Duration::from_secs(600);

/// A registry holding the full infrastructure set in dependency order.
pub fn default_registry(runtime: Arc<dyn ContainerRuntime>) -> Result<Registry> {
    let mut registry = Registry::new();
    for def in default_definitions(runtime) {
        registry.register(def)?;
    }
    Ok(registry)
}

/// A registry holding only the named services (reduced/bootstrap
/// deployments run just the coordination service on non-leader hosts).
/// Fails with [`Error::UnknownService`] for names outside the catalog.
pub fn registry_for(names: &[&str], runtime: Arc<dyn ContainerRuntime>) -> Result<Registry> {
    let catalog: Vec<&str> = vec![
        COORDINATOR,
        IMAGE_REGISTRY,
        SEARCH_INDEX,
        LOG_PIPELINE,
        METRICS_STORE,
        DASHBOARD,
    ];
    for name in names {
        if !catalog.contains(name) {
            return Err(Error::UnknownService(name.to_string()));
        }
    }
    let mut registry = Registry::new();
    for def in default_definitions(runtime) {
        if names.contains(&def.name()) {
            registry.register(def)?;
        }
    }
    Ok(registry)
}

/// Scoped environment entries wiring the coordination service into its
/// ensemble, ready for [`EnvMap::merge`](crate::env::EnvMap::merge).
/// A zero `server_id` or empty member list contributes nothing, matching a
/// single-node deployment.
pub fn quorum_entries(server_id: u32, members: &[String]) -> Vec<String> {
    let mut entries = Vec::new();
    if server_id > 0 {
        entries.push(format!("{}:SERVER_ID={}", COORDINATOR, server_id));
    }
    if !members.is_empty() {
        entries.push(format!("{}:QUORUM={}", COORDINATOR, members.join(",")));
    }
    entries
}

/// All infrastructure definitions, in dependency order.
pub fn default_definitions(runtime: Arc<dyn ContainerRuntime>) -> Vec<ServiceDefinition> {
    let image = |(repo, tag): (&str, &str)| ImageRef::new(repo, tag);

    vec![
        ServiceDefinition::builder(COORDINATOR, image(COORDINATOR_IMAGE), Arc::clone(&runtime))
            .startup_timeout(Duration::from_secs(300))
            .check(
                "client-port",
                CheckKind::Port {
                    host: "127.0.0.1".into(),
                    port: 2181,
                },
            )
            .check(
                "answers-ruok",
                CheckKind::Exec {
                    command: vec!["/opt/coordinator/bin/ruok.sh".into()],
                },
            )
            .log("/var/log/coordinator.log", vec!["coordinator".into()])
            .build(),
        ServiceDefinition::builder(
            IMAGE_REGISTRY,
            image(IMAGE_REGISTRY_IMAGE),
            Arc::clone(&runtime),
        )
        .startup_timeout(Duration::from_secs(180))
        .check(
            "api",
            CheckKind::Http {
                url: "http://127.0.0.1:5000/v2/".into(),
            },
        )
        .log("/var/log/image-registry.log", vec!["image-registry".into()])
        .build(),
        ServiceDefinition::builder(
            SEARCH_INDEX,
            image(SEARCH_INDEX_IMAGE),
            Arc::clone(&runtime),
        )
        .startup_timeout(SEARCH_INDEX_STARTUP_TIMEOUT)
        .check(
            "cluster-health",
            CheckKind::Http {
                url: "http://127.0.0.1:9200/_cluster/health".into(),
            },
        )
        .log("/var/log/search-index.log", vec!["search-index".into()])
        .build(),
        ServiceDefinition::builder(
            LOG_PIPELINE,
            image(LOG_PIPELINE_IMAGE),
            Arc::clone(&runtime),
        )
        .startup_timeout(Duration::from_secs(300))
        .check(
            "shipper-port",
            CheckKind::Port {
                host: "127.0.0.1".into(),
                port: 5043,
            },
        )
        .log("/var/log/log-pipeline.log", vec!["log-pipeline".into()])
        .build(),
        ServiceDefinition::builder(
            METRICS_STORE,
            image(METRICS_STORE_IMAGE),
            Arc::clone(&runtime),
        )
        .startup_timeout(Duration::from_secs(300))
        .check(
            "version",
            CheckKind::Http {
                url: "http://127.0.0.1:4242/version".into(),
            },
        )
        .log("/var/log/metrics-store.log", vec!["metrics-store".into()])
        .build(),
        ServiceDefinition::builder(DASHBOARD, image(DASHBOARD_IMAGE), runtime)
            .startup_timeout(Duration::from_secs(180))
            .check(
                "status",
                CheckKind::Http {
                    url: "http://127.0.0.1:5601/api/status".into(),
                },
            )
            .log("/var/log/dashboard.log", vec!["dashboard".into()])
            .build(),
    ]
}
