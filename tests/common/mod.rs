//! Shared test support: an in-memory container runtime and definition
//! helpers with fast poll intervals.
// Not every test binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use isvcs::definition::{ImageRef, ServiceDefinition};
use isvcs::health::CheckKind;
use isvcs::runtime::{ContainerRuntime, ContainerState, ExecOutput, RuntimeError};
use isvcs::{Manager, Phase};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Fast poll cadence for tests.
pub const TICK: Duration = Duration::from_millis(40);

struct MockContainer {
    running: bool,
}

/// In-memory stand-in for the container runtime.
///
/// Health is simulated through exec probes: each service's probe command is
/// a single token whose exit code tests flip with [`set_probe_exit`].
#[derive(Default)]
pub struct MockRuntime {
    next_id: AtomicU64,
    containers: Mutex<HashMap<String, MockContainer>>,
    probe_exits: Mutex<HashMap<String, i32>>,
    create_failures: Mutex<Vec<String>>,
    ops: Mutex<Vec<String>>,
}

impl MockRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Set the exit code the given probe token returns from now on.
    pub fn set_probe_exit(&self, probe: &str, code: i32) {
        self.probe_exits
            .lock()
            .unwrap()
            .insert(probe.to_string(), code);
    }

    /// Make `create` fail for images whose repo contains the fragment.
    pub fn fail_create_for(&self, repo_fragment: &str) {
        self.create_failures
            .lock()
            .unwrap()
            .push(repo_fragment.to_string());
    }

    pub fn is_running(&self, container_id: &str) -> bool {
        self.containers
            .lock()
            .unwrap()
            .get(container_id)
            .map(|c| c.running)
            .unwrap_or(false)
    }

    /// Operations recorded so far, e.g. `create isvcs/a:v1` or `stop ctr-1`.
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn op_count(&self, prefix: &str) -> usize {
        self.ops().iter().filter(|op| op.starts_with(prefix)).count()
    }

    fn record(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn create(
        &self,
        image: &ImageRef,
        _env: &HashMap<String, String>,
    ) -> Result<String, RuntimeError> {
        self.record(format!("create {}", image));
        let failing = self.create_failures.lock().unwrap().clone();
        if failing.iter().any(|f| image.repo.contains(f)) {
            return Err(RuntimeError::CommandFailed {
                command: format!("create {}", image),
                stderr: "no such image".to_string(),
                exit_code: Some(1),
            });
        }
        let id = format!("ctr-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.containers
            .lock()
            .unwrap()
            .insert(id.clone(), MockContainer { running: false });
        Ok(id)
    }

    async fn start(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.record(format!("start {}", container_id));
        match self.containers.lock().unwrap().get_mut(container_id) {
            Some(container) => {
                container.running = true;
                Ok(())
            }
            None => Err(RuntimeError::not_found(container_id)),
        }
    }

    async fn stop(&self, container_id: &str, _grace: Duration) -> Result<(), RuntimeError> {
        self.record(format!("stop {}", container_id));
        match self.containers.lock().unwrap().get_mut(container_id) {
            Some(container) => {
                container.running = false;
                Ok(())
            }
            None => Err(RuntimeError::not_found(container_id)),
        }
    }

    async fn kill(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.record(format!("kill {}", container_id));
        if let Some(container) = self.containers.lock().unwrap().get_mut(container_id) {
            container.running = false;
        }
        Ok(())
    }

    async fn inspect(&self, container_id: &str) -> Result<ContainerState, RuntimeError> {
        match self.containers.lock().unwrap().get(container_id) {
            Some(container) => Ok(ContainerState {
                running: container.running,
                exit_code: if container.running { None } else { Some(0) },
            }),
            None => Err(RuntimeError::not_found(container_id)),
        }
    }

    async fn exec(
        &self,
        container_id: &str,
        command: &[String],
    ) -> Result<ExecOutput, RuntimeError> {
        if !self.containers.lock().unwrap().contains_key(container_id) {
            return Err(RuntimeError::not_found(container_id));
        }
        let probe = command.first().map(String::as_str).unwrap_or_default();
        let exit_code = self
            .probe_exits
            .lock()
            .unwrap()
            .get(probe)
            .copied()
            .unwrap_or(0);
        Ok(ExecOutput {
            exit_code,
            output: String::new(),
        })
    }
}

/// The probe token used for a service built with [`probed_service`].
pub fn probe_token(name: &str) -> String {
    format!("probe-{}", name)
}

/// A definition whose single exec probe is controlled through the mock:
/// by default it passes (unset probes exit 0).
pub fn probed_service(
    name: &str,
    runtime: Arc<MockRuntime>,
    startup_timeout: Duration,
    failure_threshold: u32,
) -> ServiceDefinition {
    ServiceDefinition::builder(
        name,
        ImageRef::new(format!("isvcs/{}", name), "v1"),
        runtime,
    )
    .interval(TICK)
    .startup_timeout(startup_timeout)
    .failure_threshold(failure_threshold)
    .check(
        "probe",
        CheckKind::Exec {
            command: vec![probe_token(name)],
        },
    )
    .build()
}

/// Poll `status()` until the service reaches the phase or the timeout
/// passes. Returns whether the phase was reached.
pub async fn wait_for_phase(
    manager: &Manager,
    service: &str,
    phase: Phase,
    timeout: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if manager.status()[service].phase == phase {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
