use std::fmt;
use std::time::Duration;

/// Structured error type for container-runtime operations.
///
/// Machine-actionable variants instead of a single string, so callers can
/// distinguish a missing container from a dead daemon.
#[derive(Debug)]
pub enum RuntimeError {
    /// Runtime command timed out.
    Timeout { command: String, timeout: Duration },

    /// Runtime command ran but returned non-zero exit.
    CommandFailed {
        command: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    /// Runtime binary couldn't be executed (not in PATH, permission denied).
    ExecFailed {
        command: String,
        source: std::io::Error,
    },

    /// Container doesn't exist (parsed from "No such container" stderr).
    ContainerNotFound { container: String },

    /// Runtime daemon not responding.
    DaemonUnavailable,
}

impl RuntimeError {
    /// Create a timeout error.
    pub fn timeout(cmd: impl Into<String>, dur: Duration) -> Self {
        RuntimeError::Timeout {
            command: cmd.into(),
            timeout: dur,
        }
    }

    /// Create a command-failed error from an `std::process::Output`.
    pub fn failed(cmd: impl Into<String>, output: &std::process::Output) -> Self {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        RuntimeError::CommandFailed {
            command: cmd.into(),
            stderr,
            exit_code: output.status.code(),
        }
    }

    /// Create an exec-failed error (binary not found / permission denied).
    pub fn exec_failed(cmd: impl Into<String>, err: std::io::Error) -> Self {
        RuntimeError::ExecFailed {
            command: cmd.into(),
            source: err,
        }
    }

    /// Create a container-not-found error.
    pub fn not_found(container: impl Into<String>) -> Self {
        RuntimeError::ContainerNotFound {
            container: container.into(),
        }
    }

    /// True when the error means the container simply isn't there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::ContainerNotFound { .. })
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Timeout { command, timeout } => {
                write!(
                    f,
                    "Timed out running '{}' (exceeded {} seconds)",
                    command,
                    timeout.as_secs()
                )
            }
            RuntimeError::CommandFailed {
                command,
                stderr,
                exit_code,
            } => {
                if let Some(code) = exit_code {
                    write!(f, "'{}' failed (exit code {}): {}", command, code, stderr)
                } else {
                    write!(f, "'{}' failed: {}", command, stderr)
                }
            }
            RuntimeError::ExecFailed { command, source } => {
                write!(f, "Failed to execute '{}': {}", command, source)
            }
            RuntimeError::ContainerNotFound { container } => {
                write!(f, "No such container: {}", container)
            }
            RuntimeError::DaemonUnavailable => {
                write!(f, "Container runtime daemon is not responding")
            }
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::ExecFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
