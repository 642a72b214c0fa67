//! Start and stop sequencing for internal services.
//!
//! Startup walks the target set in registration order and waits for each
//! service to resolve to Running or Failed before moving on, so a service
//! can depend on everything registered before it. A failure is recorded in
//! the [`StartSummary`] and the batch continues: partial startup is a
//! reportable end state, not a fatal error.

use crate::artifact::ArtifactContext;
use crate::definition::ServiceDefinition;
use crate::error::{Error, Result};
use crate::health::monitor::Monitor;
use crate::state::Phase;
use std::collections::HashMap;
use std::sync::Arc;

use super::core::{Inner, Manager, ServiceHandle};

/// How one service's start attempt ended.
#[derive(Debug)]
pub struct StartOutcome {
    pub service: String,
    /// Phase observed when the attempt resolved (Running or Failed).
    pub phase: Phase,
    pub error: Option<Error>,
}

/// Aggregate result of a start batch: every failure enumerated alongside
/// every success, in attempt order.
#[derive(Debug, Default)]
pub struct StartSummary {
    pub outcomes: Vec<StartOutcome>,
}

impl StartSummary {
    pub fn all_running(&self) -> bool {
        self.outcomes.iter().all(|o| o.error.is_none())
    }

    /// Services that came up, in start order.
    pub fn running(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.error.is_none())
            .map(|o| o.service.as_str())
    }

    /// Services that did not come up, with their recorded errors.
    pub fn failed(&self) -> impl Iterator<Item = &StartOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }

    pub fn get(&self, service: &str) -> Option<&StartOutcome> {
        self.outcomes.iter().find(|o| o.service == service)
    }
}

impl Manager {
    /// Bring every registered service up, in registration order.
    pub async fn start_all(&self) -> Result<StartSummary> {
        let defs = self.inner.registry.all();
        Ok(self.inner.start_sequence(defs).await)
    }

    /// Bring a named subset up. Unknown names fail before any container
    /// work begins; the resolved set starts in registration order.
    pub async fn start<S: AsRef<str>>(&self, names: &[S]) -> Result<StartSummary> {
        let defs = self.inner.registry.subset(names)?;
        Ok(self.inner.start_sequence(defs).await)
    }

    /// Gracefully stop a named subset, most recently registered first.
    pub async fn stop<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let defs = self.inner.registry.subset(names)?;
        self.inner.stop_sequence(defs).await
    }

    /// Gracefully stop everything, most recently registered first.
    pub async fn stop_all(&self) -> Result<()> {
        let defs = self.inner.registry.all();
        self.inner.stop_sequence(defs).await
    }

    /// Stop and start one service again. Used by operators and by the
    /// restart failure policy; the restart counter survives.
    pub async fn restart(&self, name: &str) -> Result<()> {
        self.inner.restart_service(name).await
    }
}

impl Inner {
    async fn start_sequence(&self, defs: Vec<Arc<ServiceDefinition>>) -> StartSummary {
        let mut summary = StartSummary::default();
        for def in defs {
            let handle = match self.handle(def.name()) {
                Ok(handle) => handle,
                Err(err) => {
                    summary.outcomes.push(StartOutcome {
                        service: def.name().to_string(),
                        phase: Phase::Unregistered,
                        error: Some(err),
                    });
                    continue;
                }
            };
            let result = self.start_service(handle).await;
            if let Err(ref err) = result {
                tracing::warn!(
                    "Service '{}' failed to start, continuing with remaining services: {}",
                    def.name(),
                    err
                );
            }
            summary.outcomes.push(StartOutcome {
                service: def.name().to_string(),
                phase: handle.state.phase(),
                error: result.err(),
            });
        }
        summary
    }

    async fn stop_sequence(&self, mut defs: Vec<Arc<ServiceDefinition>>) -> Result<()> {
        defs.reverse();
        let mut errors = Vec::new();
        for def in defs {
            let handle = self.handle(def.name())?;
            if let Err(err) = self.stop_service(handle).await {
                tracing::error!("Failed to stop service '{}': {}", def.name(), err);
                errors.push(err);
            }
        }
        Error::aggregate(errors)
    }

    /// Run the full start path for one service and wait for it to resolve.
    pub(super) async fn start_service(&self, handle: &Arc<ServiceHandle>) -> Result<()> {
        let _guard = handle.op_lock.lock().await;

        let phase = handle.state.phase();
        if phase.is_monitored() {
            tracing::debug!(
                "Service '{}' is already {}, skipping start",
                handle.def.name(),
                phase
            );
            return Ok(());
        }

        tracing::info!("Starting internal service '{}'", handle.def.name());
        handle.state.set_phase(Phase::Starting);

        if let Err(err) = self.launch(handle).await {
            handle.state.set_phase(Phase::Failed);
            return Err(err);
        }

        let cancel = handle
            .cancel
            .lock()
            .expect("cancel lock poisoned")
            .clone();
        self.await_running(handle, cancel).await
    }

    /// Prepare the environment and artifact, bind a container, and spawn the
    /// monitor loop. Does not wait for health.
    async fn launch(&self, handle: &Arc<ServiceHandle>) -> Result<()> {
        let def = &handle.def;
        let name = def.name();

        let env = self.env.snapshot(name);
        for key in def.required_env() {
            if !env.contains_key(key) {
                return Err(Error::MissingEnvKey {
                    service: name.to_string(),
                    key: key.clone(),
                });
            }
        }

        if let Some(writer) = &self.artifact {
            let ctx = ArtifactContext {
                service: name.to_string(),
                env: env.clone(),
                logs: def.logs().to_vec(),
            };
            writer.write(&ctx).await.map_err(|e| Error::Artifact {
                service: name.to_string(),
                message: e.to_string(),
            })?;
        }

        let container_id = self.ensure_container(def, handle, &env).await?;
        handle.state.set_container_id(Some(container_id));

        let cancel = self.root_cancel.child_token();
        *handle.cancel.lock().expect("cancel lock poisoned") = cancel.clone();
        let monitor = Monitor {
            def: Arc::clone(def),
            state: Arc::clone(&handle.state),
            events: self.events_tx.clone(),
            cancel,
        };
        *handle.monitor.lock().await = Some(monitor.spawn());
        Ok(())
    }

    /// Create a container for the service, or reuse the one already bound:
    /// a still-running container is adopted, an exited one is restarted, a
    /// vanished one is replaced.
    async fn ensure_container(
        &self,
        def: &Arc<ServiceDefinition>,
        handle: &Arc<ServiceHandle>,
        env: &HashMap<String, String>,
    ) -> Result<String> {
        let name = def.name();
        let runtime = def.runtime();

        if let Some(existing) = handle.state.container_id() {
            match runtime.inspect(&existing).await {
                Ok(state) if state.running => {
                    tracing::debug!("Adopting running container {} for '{}'", existing, name);
                    return Ok(existing);
                }
                Ok(_) => {
                    tracing::debug!("Restarting exited container {} for '{}'", existing, name);
                    runtime
                        .start(&existing)
                        .await
                        .map_err(|e| Error::runtime(name, "start", e))?;
                    return Ok(existing);
                }
                Err(e) if e.is_not_found() => {
                    tracing::debug!("Container {} for '{}' is gone, recreating", existing, name);
                }
                Err(e) => return Err(Error::runtime(name, "inspect", e)),
            }
        }

        let id = runtime
            .create(def.image(), env)
            .await
            .map_err(|e| Error::runtime(name, "create", e))?;
        runtime
            .start(&id)
            .await
            .map_err(|e| Error::runtime(name, "start", e))?;
        tracing::debug!("Created container {} for '{}'", id, name);
        Ok(id)
    }

    /// Wait for the monitor to resolve the start attempt. The monitor owns
    /// the startup deadline; the extra slack here only covers a monitor that
    /// dies without reporting.
    async fn await_running(
        &self,
        handle: &Arc<ServiceHandle>,
        cancel: tokio_util::sync::CancellationToken,
    ) -> Result<()> {
        enum StartWait {
            Running,
            Failed,
            Interrupted,
        }

        let def = &handle.def;
        let timeout_err = || Error::StartupTimeout {
            service: def.name().to_string(),
            timeout: def.startup_timeout(),
        };

        let budget = def.startup_timeout() + def.health().interval * 2;
        let mut rx = handle.state.subscribe();
        let resolved = tokio::time::timeout(budget, async {
            loop {
                match *rx.borrow_and_update() {
                    Phase::Running => return StartWait::Running,
                    Phase::Failed => return StartWait::Failed,
                    _ => {}
                }
                tokio::select! {
                    _ = cancel.cancelled() => return StartWait::Interrupted,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            return StartWait::Failed;
                        }
                    }
                }
            }
        })
        .await;

        match resolved {
            Ok(StartWait::Running) => {
                tracing::info!("Service '{}' is running", def.name());
                Ok(())
            }
            Ok(StartWait::Failed) => Err(timeout_err()),
            Ok(StartWait::Interrupted) => {
                // A concurrent stop cancelled the monitor; the stopper owns
                // the phase from here.
                tracing::debug!("Start of '{}' interrupted by stop", def.name());
                Err(timeout_err())
            }
            Err(_) => {
                // Monitor never reported; make the phase reflect reality.
                self.halt_monitor(handle).await;
                handle.state.set_phase(Phase::Failed);
                Err(timeout_err())
            }
        }
    }

    /// Stop one service: monitor first (no stale health mid-shutdown), then
    /// the container, escalating to kill if the graceful stop fails.
    pub(super) async fn stop_service(&self, handle: &Arc<ServiceHandle>) -> Result<()> {
        // Cancel the monitor before taking the per-service lock so an
        // in-flight start attempt stops waiting instead of running out its
        // startup timeout.
        handle
            .cancel
            .lock()
            .expect("cancel lock poisoned")
            .cancel();
        let _guard = handle.op_lock.lock().await;

        let def = &handle.def;
        let name = def.name();
        if !matches!(
            handle.state.phase(),
            Phase::Starting | Phase::Running | Phase::Degraded | Phase::Failed
        ) {
            return Ok(());
        }

        tracing::info!("Stopping internal service '{}'", name);
        self.halt_monitor(handle).await;
        handle.state.set_phase(Phase::Stopping);

        let mut result = Ok(());
        if let Some(id) = handle.state.container_id() {
            match def.runtime().stop(&id, self.stop_grace).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(stop_err) => {
                    tracing::warn!(
                        "Graceful stop of '{}' failed ({}), killing container",
                        name,
                        stop_err
                    );
                    if let Err(kill_err) = def.runtime().kill(&id).await {
                        result = Err(Error::runtime(name, "kill", kill_err));
                    }
                }
            }
        }

        handle.state.set_container_id(None);
        handle.state.set_phase(Phase::Stopped);
        result
    }

    /// Cancel the service's monitor loop and wait for it to exit, so no poll
    /// runs after cancellation was requested.
    async fn halt_monitor(&self, handle: &Arc<ServiceHandle>) {
        handle
            .cancel
            .lock()
            .expect("cancel lock poisoned")
            .cancel();
        let task = handle.monitor.lock().await.take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    pub(super) async fn restart_service(&self, name: &str) -> Result<()> {
        let handle = self.handle(name)?;
        self.stop_service(handle).await?;
        self.start_service(handle).await
    }
}
