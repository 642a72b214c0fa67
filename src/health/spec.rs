//! Health check configuration for a service.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default cadence between poll cycles (5 seconds).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of consecutive failed cycles before a Running service is
/// declared Failed.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// One liveness probe, identified by name within its service.
///
/// ```yaml
/// - name: client-port
///   port:
///     host: "127.0.0.1"
///     port: 2181
/// - name: admin
///   http:
///     url: "http://127.0.0.1:9200/_cluster/health"
/// - name: answers-ruok
///   exec:
///     command: ["/opt/coordinator/bin/ruok.sh"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckDef {
    pub name: String,
    #[serde(flatten)]
    pub kind: CheckKind,
}

/// The probe mechanism behind a check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    /// TCP connect to host:port succeeds.
    Port { host: String, port: u16 },
    /// HTTP GET returns a 2xx status.
    Http { url: String },
    /// Command run inside the container exits 0.
    Exec { command: Vec<String> },
}

/// Health checking for one service: the ordered set of named checks, the
/// poll cadence, and the failure threshold.
///
/// The per-check timeout is the poll interval: a probe that can't answer
/// within one cycle is a failed probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    pub checks: Vec<CheckDef>,
    #[serde(with = "duration_secs", default = "default_interval")]
    pub interval: Duration,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

impl Default for HealthCheckSpec {
    fn default() -> Self {
        Self {
            checks: Vec::new(),
            interval: DEFAULT_INTERVAL,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

impl HealthCheckSpec {
    /// Per-check timeout, derived from the poll interval.
    pub fn check_timeout(&self) -> Duration {
        self.interval
    }

    /// Threshold clamped to at least one cycle.
    pub fn effective_threshold(&self) -> u32 {
        self.failure_threshold.max(1)
    }
}

/// Durations serialize as whole seconds in operator manifests.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_from_yaml() {
        let yaml = r#"
checks:
  - name: client-port
    port:
      host: "127.0.0.1"
      port: 2181
  - name: admin
    http:
      url: "http://127.0.0.1:9200/_cluster/health"
interval: 10
failure_threshold: 5
"#;
        let spec: HealthCheckSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.checks.len(), 2);
        assert_eq!(spec.checks[0].name, "client-port");
        assert!(matches!(spec.checks[0].kind, CheckKind::Port { port: 2181, .. }));
        assert_eq!(spec.interval, Duration::from_secs(10));
        assert_eq!(spec.failure_threshold, 5);
    }

    #[test]
    fn spec_defaults_from_yaml() {
        let yaml = r#"
checks:
  - name: probe
    exec:
      command: ["true"]
"#;
        let spec: HealthCheckSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.interval, DEFAULT_INTERVAL);
        assert_eq!(spec.failure_threshold, DEFAULT_FAILURE_THRESHOLD);
    }

    #[test]
    fn check_timeout_tracks_interval() {
        let spec = HealthCheckSpec {
            interval: Duration::from_millis(250),
            ..Default::default()
        };
        assert_eq!(spec.check_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn threshold_clamped_to_one() {
        let spec = HealthCheckSpec {
            failure_threshold: 0,
            ..Default::default()
        };
        assert_eq!(spec.effective_threshold(), 1);
    }
}
