//! Narrow client interface to the external container runtime.
//!
//! The supervisor and health monitor depend only on this surface: create,
//! start, stop, kill, inspect and exec. The production implementation
//! ([`DockerCli`]) shells out to the `docker` binary; tests substitute their
//! own [`ContainerRuntime`].

pub mod docker;
pub mod error;

pub use docker::DockerCli;
pub use error::RuntimeError;

use crate::definition::ImageRef;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Point-in-time container state as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerState {
    pub running: bool,
    /// Exit code of the main process, once it has exited.
    pub exit_code: Option<i64>,
}

/// Output of a probe command executed inside a container.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Client interface to the container runtime.
///
/// One handle is bound into every service definition at construction time
/// and shared for the process lifetime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create a container from an image with the given environment.
    /// Returns the new container's identifier; the container is not started.
    async fn create(
        &self,
        image: &ImageRef,
        env: &HashMap<String, String>,
    ) -> Result<String, RuntimeError>;

    /// Start a created or previously exited container.
    async fn start(&self, container_id: &str) -> Result<(), RuntimeError>;

    /// Request graceful termination, waiting up to `grace` for the container
    /// to exit before the runtime escalates.
    async fn stop(&self, container_id: &str, grace: Duration) -> Result<(), RuntimeError>;

    /// Terminate immediately (SIGKILL equivalent).
    async fn kill(&self, container_id: &str) -> Result<(), RuntimeError>;

    /// Inspect current container state. A missing container is
    /// [`RuntimeError::ContainerNotFound`], not a state.
    async fn inspect(&self, container_id: &str) -> Result<ContainerState, RuntimeError>;

    /// Run a probe command inside the container and capture its exit code
    /// and combined output.
    async fn exec(&self, container_id: &str, command: &[String])
        -> Result<ExecOutput, RuntimeError>;
}
