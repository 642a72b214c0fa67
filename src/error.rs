use crate::runtime::RuntimeError;
use miette::Diagnostic;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Malformed environment entry '{0}': expected KEY=VALUE or service:KEY=VALUE")]
    #[diagnostic(
        code(isvcs::env::malformed),
        help("Entries are single tokens like ZK_QUORUM=host1:2888 or coordinator:SERVER_ID=1")
    )]
    MalformedEntry(String),

    #[error("Service '{0}' is already registered")]
    #[diagnostic(
        code(isvcs::registry::duplicate),
        help("Service names must be unique; the first registration is kept")
    )]
    DuplicateService(String),

    #[error("Unknown service: {0}")]
    #[diagnostic(
        code(isvcs::registry::unknown),
        help("Only registered services can be named in a start/stop subset")
    )]
    UnknownService(String),

    #[error("Service '{service}' did not report healthy within {}s", .timeout.as_secs())]
    #[diagnostic(
        code(isvcs::start::timeout),
        help("Inspect the container logs; the start attempt is not retried automatically")
    )]
    StartupTimeout { service: String, timeout: Duration },

    #[error("Runtime {op} failed for service '{service}': {source}")]
    #[diagnostic(
        code(isvcs::runtime::error),
        help("Check that the container runtime is reachable, e.g. with `docker ps`")
    )]
    Runtime {
        service: String,
        op: &'static str,
        #[source]
        source: RuntimeError,
    },

    #[error("Service '{service}' requires environment key '{key}' which is not set")]
    #[diagnostic(
        code(isvcs::env::missing),
        help("Merge the key into the environment map before starting, e.g. \"{service}:{key}=...\"")
    )]
    MissingEnvKey { service: String, key: String },

    #[error("Startup artifact for service '{service}' could not be written: {message}")]
    #[diagnostic(code(isvcs::artifact::write_failed))]
    Artifact { service: String, message: String },

    #[error("Invalid image reference '{0}'")]
    #[diagnostic(
        code(isvcs::image::invalid),
        help("Image references look like repo/name:tag")
    )]
    InvalidImageRef(String),

    #[error("Service '{0}' is not managed by this supervisor")]
    #[diagnostic(code(isvcs::supervisor::unmanaged))]
    Unmanaged(String),

    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<Error>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a runtime-client error with the service and operation it belongs to.
    pub(crate) fn runtime(service: &str, op: &'static str, source: RuntimeError) -> Self {
        Error::Runtime {
            service: service.to_string(),
            op,
            source,
        }
    }

    /// Collapse a batch of per-service errors into a single return value.
    /// Empty input means success; a single error is returned as itself.
    pub(crate) fn aggregate(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Multiple(errors)),
        }
    }
}
