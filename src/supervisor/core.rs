use crate::artifact::ArtifactWriter;
use crate::definition::ServiceDefinition;
use crate::env::EnvMap;
use crate::error::{Error, Result};
use crate::health::monitor::ServiceEvent;
use crate::registry::Registry;
use crate::state::{ServiceState, ServiceStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::policy::{self, FailurePolicy, LeaveForOperator};

/// Default grace period granted to a container on stop before a forced kill.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(30);

/// Per-service bookkeeping: the immutable definition, the mutable runtime
/// state, and the currently bound monitor task.
pub(super) struct ServiceHandle {
    pub def: Arc<ServiceDefinition>,
    pub state: Arc<ServiceState>,
    /// Cancellation token for the current monitor loop, replaced per start.
    pub cancel: StdMutex<CancellationToken>,
    pub monitor: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    /// Serializes start/stop/restart for this one service. The phase is only
    /// ever written by the holder of this lock or by the monitor loop, never
    /// both at once.
    pub op_lock: tokio::sync::Mutex<()>,
}

pub(super) struct Inner {
    pub registry: Registry,
    pub env: Arc<EnvMap>,
    pub artifact: Option<Arc<dyn ArtifactWriter>>,
    pub policy: Arc<dyn FailurePolicy>,
    pub handles: HashMap<String, Arc<ServiceHandle>>,
    pub stop_grace: Duration,
    pub events_tx: mpsc::UnboundedSender<ServiceEvent>,
    pub root_cancel: CancellationToken,
}

impl Inner {
    pub fn handle(&self, name: &str) -> Result<&Arc<ServiceHandle>> {
        self.handles
            .get(name)
            .ok_or_else(|| Error::Unmanaged(name.to_string()))
    }
}

/// The internal-services supervisor.
///
/// Owns the [`Registry`] and drives the lifecycle of every registered
/// service through the container-runtime client bound into each definition.
/// Startup is sequential in registration order so later services can rely on
/// earlier ones being reachable; one service failing to come up never aborts
/// its siblings or the control-plane process.
///
/// # Concurrency Model
///
/// All methods take `&self`. One monitor task runs per service in a
/// monitored phase; per-service lifecycle operations are serialized by a
/// per-service lock, and [`status`](Manager::status) is a lock-light
/// snapshot safe to call at any time.
///
/// # Example
///
/// ```no_run
/// use isvcs::{catalog, EnvMap, Manager};
/// use isvcs::runtime::DockerCli;
/// use std::sync::Arc;
///
/// # async fn example() -> isvcs::Result<()> {
/// let runtime = Arc::new(DockerCli::new());
/// let registry = catalog::default_registry(runtime)?;
///
/// let env = Arc::new(EnvMap::new());
/// env.merge(&catalog::quorum_entries(1, &["10.0.0.1:2888".into()]))?;
///
/// let manager = Manager::builder(registry).environment(env).build();
/// let summary = manager.start_all().await?;
/// for failed in summary.failed() {
///     eprintln!("{} did not come up", failed.service);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Manager {
    pub(super) inner: Arc<Inner>,
    event_task: StdMutex<Option<JoinHandle<()>>>,
}

impl Manager {
    /// Start building a supervisor over an explicit registry.
    pub fn builder(registry: Registry) -> ManagerBuilder {
        ManagerBuilder {
            registry,
            env: None,
            artifact: None,
            policy: None,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    /// The shared environment map services snapshot at create time.
    pub fn environment(&self) -> &Arc<EnvMap> {
        &self.inner.env
    }

    /// Registered service names in registration (startup) order.
    pub fn service_names(&self) -> Vec<String> {
        self.inner
            .registry
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Point-in-time phase and last health result for every registered
    /// service. Safe to call concurrently with start/stop; a Failed service
    /// reports Failed, never a hidden phase.
    pub fn status(&self) -> HashMap<String, ServiceStatus> {
        self.inner
            .handles
            .iter()
            .map(|(name, handle)| (name.clone(), handle.state.status()))
            .collect()
    }

    /// Stop every service and retire the supervisor's background task.
    pub async fn shutdown(&self) -> Result<()> {
        let result = self.stop_all().await;
        self.inner.root_cancel.cancel();
        let task = self.event_task.lock().expect("event task lock poisoned").take();
        if let Some(task) = task {
            let _ = task.await;
        }
        result
    }
}

/// Builder for [`Manager`]: the definition set, environment and policies
/// are supplied here, complete, before anything runs.
pub struct ManagerBuilder {
    registry: Registry,
    env: Option<Arc<EnvMap>>,
    artifact: Option<Arc<dyn ArtifactWriter>>,
    policy: Option<Arc<dyn FailurePolicy>>,
    stop_grace: Duration,
}

impl ManagerBuilder {
    /// Share an environment map populated by the configuration loader.
    /// Defaults to an empty map.
    pub fn environment(mut self, env: Arc<EnvMap>) -> Self {
        self.env = Some(env);
        self
    }

    /// Writer invoked per service immediately before container create.
    pub fn artifact_writer(mut self, writer: Arc<dyn ArtifactWriter>) -> Self {
        self.artifact = Some(writer);
        self
    }

    /// What to do when a Running service crosses its failure threshold.
    /// Defaults to [`LeaveForOperator`].
    pub fn failure_policy(mut self, policy: Arc<dyn FailurePolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Grace period for container stop before a forced kill.
    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn build(self) -> Manager {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let handles = self
            .registry
            .all()
            .into_iter()
            .map(|def| {
                let name = def.name().to_string();
                let handle = Arc::new(ServiceHandle {
                    state: Arc::new(ServiceState::new(&name)),
                    def,
                    cancel: StdMutex::new(CancellationToken::new()),
                    monitor: tokio::sync::Mutex::new(None),
                    op_lock: tokio::sync::Mutex::new(()),
                });
                (name, handle)
            })
            .collect();

        let inner = Arc::new(Inner {
            registry: self.registry,
            env: self.env.unwrap_or_default(),
            artifact: self.artifact,
            policy: self.policy.unwrap_or_else(|| Arc::new(LeaveForOperator)),
            handles,
            stop_grace: self.stop_grace,
            events_tx,
            root_cancel: CancellationToken::new(),
        });

        let event_task = policy::spawn_event_loop(&inner, events_rx);

        Manager {
            inner,
            event_task: StdMutex::new(Some(event_task)),
        }
    }
}
