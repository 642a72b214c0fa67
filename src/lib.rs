//! # isvcs
//!
//! Internal-services supervisor for the control plane: registers, starts,
//! health-monitors, environment-configures and tears down the fixed set of
//! infrastructure containers (coordination service, search index, log
//! pipeline, metrics store, image registry, dashboard) the platform needs
//! before any user workload can be scheduled.
//!
//! ## Features
//!
//! - **Deterministic startup order**: services come up in registration order,
//!   so the coordination service is reachable before anything that needs it
//! - **Shared environment**: one key/value map, scoped per service with
//!   `service:KEY=VALUE` entries, snapshotted at container-create time
//! - **Continuous health monitoring**: one polling loop per service running
//!   port, HTTP and in-container exec probes
//! - **Graceful degradation**: a failing service is visible as Degraded, then
//!   Failed; it never takes the supervisor or its siblings down with it
//! - **Narrow runtime surface**: the container runtime is reached only
//!   through [`runtime::ContainerRuntime`]; tests substitute their own
//!
//! ## Quick Start
//!
//! ```no_run
//! use isvcs::{catalog, EnvMap, Manager};
//! use isvcs::runtime::DockerCli;
//! use std::sync::Arc;
//!
//! # async fn example() -> isvcs::Result<()> {
//! let runtime = Arc::new(DockerCli::new());
//! let registry = catalog::default_registry(runtime)?;
//!
//! let env = Arc::new(EnvMap::new());
//! env.merge(&["coordinator:SERVER_ID=1", "LOG_LEVEL=info"])?;
//!
//! let manager = Manager::builder(registry).environment(env).build();
//! let summary = manager.start_all().await?;
//!
//! // Partial startup is reportable, not fatal
//! for outcome in summary.failed() {
//!     eprintln!("{}: {:?}", outcome.service, outcome.error);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! All supervisor methods take `&self`. Each monitored service owns one
//! polling task, cancelled promptly on stop; the environment map is the only
//! structure written by more than one actor and sits behind a single short-
//! hold lock. A service's phase is written either by the supervisor or by
//! the one monitor bound to it, never both at once.

pub mod artifact;
pub mod catalog;
pub mod definition;
pub mod env;
pub mod error;
pub mod health;
pub mod registry;
pub mod runtime;
pub mod state;
pub mod supervisor;

// Re-export commonly used types
pub use artifact::{ArtifactContext, ArtifactWriter};
pub use definition::{DefinitionBuilder, ImageRef, LogSpec, ServiceDefinition};
pub use env::EnvMap;
pub use error::{Error, Result};
pub use health::{AggregateStatus, CheckDef, CheckKind, CheckOutcome, HealthCheckSpec, HealthResult};
pub use registry::Registry;
pub use state::{Phase, ServiceStatus};
pub use supervisor::{
    FailureAction, FailurePolicy, LeaveForOperator, Manager, ManagerBuilder, RestartOnFailure,
    StartOutcome, StartSummary,
};
