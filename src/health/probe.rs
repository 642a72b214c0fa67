//! Liveness probes backing the declared health checks.
//!
//! A probe never returns an error: whatever goes wrong (connection refused,
//! non-2xx status, exec failure, bad configuration) is recorded as a failed
//! [`CheckOutcome`] with the detail in the message, and the remaining checks
//! of the cycle still run.

use super::result::CheckOutcome;
use super::spec::{CheckDef, CheckKind};
use crate::definition::ServiceDefinition;
use crate::runtime::ContainerRuntime;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Cap on probe output quoted into a failure message.
const MESSAGE_LIMIT: usize = 200;

/// Shared HTTP client for all HTTP probes.
///
/// One pooled client prevents file descriptor exhaustion when many services
/// declare HTTP checks. The 30s client timeout is a fallback; each request
/// carries the per-check timeout.
static SHARED_HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

fn shared_client() -> &'static Client {
    SHARED_HTTP_CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .expect("failed to build shared HTTP client")
    })
}

/// One executable liveness probe.
#[async_trait]
pub(crate) trait Probe: Send + Sync {
    fn name(&self) -> &str;

    /// Run the probe against the currently bound container.
    async fn run(&self, container_id: &str) -> CheckOutcome;
}

/// TCP connect succeeds within the check timeout.
pub(crate) struct PortProbe {
    name: String,
    host: String,
    port: u16,
}

#[async_trait]
impl Probe for PortProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _container_id: &str) -> CheckOutcome {
        let addr = format!("{}:{}", self.host, self.port);
        match tokio::net::TcpStream::connect(&addr).await {
            Ok(_) => CheckOutcome::pass(&self.name),
            Err(e) => CheckOutcome::fail(&self.name, format!("connect {}: {}", addr, e)),
        }
    }
}

/// HTTP GET returns a 2xx status within the check timeout.
pub(crate) struct HttpProbe {
    name: String,
    url: String,
    timeout: Duration,
}

#[async_trait]
impl Probe for HttpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _container_id: &str) -> CheckOutcome {
        match shared_client()
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => CheckOutcome::pass(&self.name),
            Ok(response) => CheckOutcome::fail(
                &self.name,
                format!("GET {} returned {}", self.url, response.status()),
            ),
            Err(e) => CheckOutcome::fail(&self.name, format!("GET {}: {}", self.url, e)),
        }
    }
}

/// Command executed inside the container exits 0.
pub(crate) struct ExecProbe {
    name: String,
    command: Vec<String>,
    runtime: Arc<dyn ContainerRuntime>,
}

#[async_trait]
impl Probe for ExecProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, container_id: &str) -> CheckOutcome {
        if container_id.is_empty() {
            return CheckOutcome::fail(&self.name, "no container bound");
        }
        match self.runtime.exec(container_id, &self.command).await {
            Ok(output) if output.success() => CheckOutcome::pass(&self.name),
            Ok(output) => {
                let detail: String = output.output.trim().chars().take(MESSAGE_LIMIT).collect();
                CheckOutcome::fail(
                    &self.name,
                    format!("exit code {}: {}", output.exit_code, detail),
                )
            }
            Err(e) => CheckOutcome::fail(&self.name, e.to_string()),
        }
    }
}

/// A check whose configuration is unusable; fails every cycle with the same
/// message so the problem is visible in `Status()` instead of being dropped.
pub(crate) struct BrokenProbe {
    name: String,
    message: String,
}

#[async_trait]
impl Probe for BrokenProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _container_id: &str) -> CheckOutcome {
        CheckOutcome::fail(&self.name, self.message.clone())
    }
}

/// Materialize a service's declared checks into runnable probes.
pub(crate) fn build_probes(def: &ServiceDefinition) -> Vec<Box<dyn Probe>> {
    let timeout = def.health().check_timeout();
    def.health()
        .checks
        .iter()
        .map(|check| build_probe(check, timeout, def.runtime()))
        .collect()
}

fn build_probe(
    check: &CheckDef,
    timeout: Duration,
    runtime: &Arc<dyn ContainerRuntime>,
) -> Box<dyn Probe> {
    match &check.kind {
        CheckKind::Port { host, port } => Box::new(PortProbe {
            name: check.name.clone(),
            host: host.clone(),
            port: *port,
        }),
        CheckKind::Http { url } => match url::Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {
                Box::new(HttpProbe {
                    name: check.name.clone(),
                    url: url.clone(),
                    timeout,
                })
            }
            Ok(parsed) => {
                tracing::warn!(
                    "Health check '{}' has unsupported scheme '{}'",
                    check.name,
                    parsed.scheme()
                );
                Box::new(BrokenProbe {
                    name: check.name.clone(),
                    message: format!("unsupported URL scheme '{}'", parsed.scheme()),
                })
            }
            Err(e) => {
                tracing::warn!("Health check '{}' has invalid URL: {}", check.name, e);
                Box::new(BrokenProbe {
                    name: check.name.clone(),
                    message: format!("invalid URL '{}': {}", url, e),
                })
            }
        },
        CheckKind::Exec { command } => Box::new(ExecProbe {
            name: check.name.clone(),
            command: command.clone(),
            runtime: Arc::clone(runtime),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn port_probe_unreachable_port_fails() {
        let probe = PortProbe {
            name: "client-port".into(),
            host: "127.0.0.1".into(),
            port: 59999,
        };
        let outcome = probe.run("c1").await;
        assert!(!outcome.passed);
        assert!(outcome.message.contains("127.0.0.1:59999"));
    }

    #[tokio::test]
    async fn port_probe_reachable_port_passes() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = PortProbe {
            name: "client-port".into(),
            host: "127.0.0.1".into(),
            port,
        };
        let outcome = probe.run("c1").await;
        assert!(outcome.passed, "{}", outcome.message);
    }

    #[tokio::test]
    async fn http_probe_unreachable_fails() {
        let probe = HttpProbe {
            name: "admin".into(),
            url: "http://127.0.0.1:59998/health".into(),
            timeout: Duration::from_secs(1),
        };
        let outcome = probe.run("c1").await;
        assert!(!outcome.passed);
    }

    #[tokio::test]
    async fn broken_probe_reports_bad_url() {
        let probe = BrokenProbe {
            name: "admin".into(),
            message: "invalid URL 'not-a-url'".into(),
        };
        let outcome = probe.run("c1").await;
        assert!(!outcome.passed);
        assert!(outcome.message.contains("not-a-url"));
    }
}
