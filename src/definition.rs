//! Declarative description of one internal service.
//!
//! A [`ServiceDefinition`] is built complete (image, timeouts, health
//! checks, environment requirements and the runtime binding) before it is
//! handed to the [`Registry`](crate::registry::Registry), and is immutable
//! from then on. Mutable runtime state lives with the supervisor, not here.

use crate::error::{Error, Result};
use crate::health::HealthCheckSpec;
use crate::health::spec::CheckKind;
use crate::runtime::ContainerRuntime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default time a service gets to report healthy after start (2 minutes).
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(120);

/// Container image repository plus tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub repo: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(repo: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repo, self.tag)
    }
}

impl FromStr for ImageRef {
    type Err = Error;

    /// Parse `repo:tag`. A colon inside a registry host (`host:5000/img`)
    /// is not a tag separator; an untagged reference gets `latest`.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidImageRef(s.to_string()));
        }
        match s.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') => {
                if repo.is_empty() || tag.is_empty() {
                    return Err(Error::InvalidImageRef(s.to_string()));
                }
                Ok(ImageRef::new(repo, tag))
            }
            _ => Ok(ImageRef::new(s, "latest")),
        }
    }
}

/// A log file the service writes inside its container, with the tags the
/// log pipeline attaches to lines shipped from it. Consumed by the
/// startup-artifact writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSpec {
    pub path: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl LogSpec {
    pub fn new(path: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            path: path.into(),
            tags,
        }
    }
}

/// Immutable description of one internal service: what to run, how long to
/// wait for it, how to probe it, and which environment keys it consumes.
pub struct ServiceDefinition {
    name: String,
    image: ImageRef,
    startup_timeout: Duration,
    health: HealthCheckSpec,
    required_env: Vec<String>,
    logs: Vec<LogSpec>,
    runtime: Arc<dyn ContainerRuntime>,
}

impl fmt::Debug for ServiceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("name", &self.name)
            .field("image", &self.image)
            .field("startup_timeout", &self.startup_timeout)
            .field("checks", &self.health.checks.len())
            .finish()
    }
}

impl ServiceDefinition {
    /// Start building a definition. Name, image and the runtime binding are
    /// mandatory up front; everything else has defaults.
    pub fn builder(
        name: impl Into<String>,
        image: ImageRef,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> DefinitionBuilder {
        DefinitionBuilder {
            name: name.into(),
            image,
            runtime,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            health: HealthCheckSpec::default(),
            required_env: Vec::new(),
            logs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn startup_timeout(&self) -> Duration {
        self.startup_timeout
    }

    pub fn health(&self) -> &HealthCheckSpec {
        &self.health
    }

    pub fn required_env(&self) -> &[String] {
        &self.required_env
    }

    pub fn logs(&self) -> &[LogSpec] {
        &self.logs
    }

    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }
}

/// Fluent builder for [`ServiceDefinition`].
pub struct DefinitionBuilder {
    name: String,
    image: ImageRef,
    runtime: Arc<dyn ContainerRuntime>,
    startup_timeout: Duration,
    health: HealthCheckSpec,
    required_env: Vec<String>,
    logs: Vec<LogSpec>,
}

impl DefinitionBuilder {
    /// Maximum time to wait for the first healthy cycle after start.
    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Replace the whole health-check spec at once.
    pub fn health(mut self, spec: HealthCheckSpec) -> Self {
        self.health = spec;
        self
    }

    /// Append one named check.
    pub fn check(mut self, name: impl Into<String>, kind: CheckKind) -> Self {
        self.health.checks.push(crate::health::spec::CheckDef {
            name: name.into(),
            kind,
        });
        self
    }

    /// Cadence between poll cycles (also the per-check timeout).
    pub fn interval(mut self, interval: Duration) -> Self {
        self.health.interval = interval;
        self
    }

    /// Consecutive failed cycles before a Running service is declared Failed.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.health.failure_threshold = threshold;
        self
    }

    /// Declare an environment key this service consumes at create time.
    /// Missing keys fail that service's start.
    pub fn require_env(mut self, key: impl Into<String>) -> Self {
        self.required_env.push(key.into());
        self
    }

    /// Declare a log file the service emits, for the artifact writer.
    pub fn log(mut self, path: impl Into<String>, tags: Vec<String>) -> Self {
        self.logs.push(LogSpec::new(path, tags));
        self
    }

    pub fn build(self) -> ServiceDefinition {
        ServiceDefinition {
            name: self.name,
            image: self.image,
            startup_timeout: self.startup_timeout,
            health: self.health,
            required_env: self.required_env,
            logs: self.logs,
            runtime: self.runtime,
        }
    }
}
