//! Service lifecycle phases and per-service runtime state.

use crate::health::HealthResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, RwLock};
use tokio::sync::watch;

/// Current lifecycle phase of an internal service.
///
/// Phases transition as services are registered, started, monitored, and
/// stopped. The typical lifecycle is: `Registered` → `Starting` → `Running`,
/// with `Degraded` and `Failed` on the health-failure path.
///
/// # Phase Transitions
///
/// ```text
/// Registered ──► Starting ──► Running ◄──► Degraded
///                   │            │             │
///                   ▼            ▼             ▼
///                 Failed ◄───────┼────────── Failed
///                   │            ▼
///                   └───────► Stopping ──► Stopped
/// ```
///
/// `Running` never jumps straight to `Failed`: a failing service is always
/// visible as `Degraded` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Known to the process, not yet handed to a registry
    Unregistered,
    /// Registered with the supervisor, not running
    Registered,
    /// Container launched, waiting for the first healthy poll cycle
    Starting,
    /// Healthy and serving
    Running,
    /// Running but failing health checks; visible to operators, container untouched
    Degraded,
    /// Graceful termination in progress
    Stopping,
    /// Not running; eligible for restart
    Stopped,
    /// Start attempt abandoned or failure threshold crossed
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Unregistered => write!(f, "unregistered"),
            Phase::Registered => write!(f, "registered"),
            Phase::Starting => write!(f, "starting"),
            Phase::Running => write!(f, "running"),
            Phase::Degraded => write!(f, "degraded"),
            Phase::Stopping => write!(f, "stopping"),
            Phase::Stopped => write!(f, "stopped"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

impl Phase {
    /// Check whether a phase transition is allowed by the state machine.
    pub fn is_valid_transition(&self, to: Phase) -> bool {
        use Phase::*;
        match (self, to) {
            (Unregistered, Registered) => true,

            // A start attempt begins
            (Registered, Starting) => true,
            (Stopped, Starting) => true,
            (Failed, Starting) => true,

            // Startup resolves one way or the other
            (Starting, Running) => true,
            (Starting, Failed) => true,
            (Starting, Stopping) => true,

            // Health monitoring while up
            (Running, Degraded) => true,
            (Running, Stopping) => true,
            (Degraded, Running) => true,
            (Degraded, Failed) => true,
            (Degraded, Stopping) => true,

            // Shutdown
            (Failed, Stopping) => true,
            (Stopping, Stopped) => true,

            // Same phase is always a no-op
            (a, b) if *a == b => true,

            _ => false,
        }
    }

    /// True for phases in which a health-monitor loop runs.
    pub fn is_monitored(&self) -> bool {
        matches!(self, Phase::Starting | Phase::Running | Phase::Degraded)
    }
}

/// Point-in-time view of one service, safe to serialize for operator tooling.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub phase: Phase,
    pub container_id: Option<String>,
    pub health: Option<HealthResult>,
}

/// Mutable runtime state for one registered service.
///
/// Owned by the supervisor and written only by the supervisor or by the one
/// monitor loop bound to this service, never both at once, so the phase
/// needs no lock beyond the watch channel itself.
pub(crate) struct ServiceState {
    name: String,
    phase: watch::Sender<Phase>,
    container_id: Mutex<Option<String>>,
    // Replaced wholesale each poll cycle; readers never observe a partial update.
    health: RwLock<Option<HealthResult>>,
    restarts: AtomicU32,
}

impl ServiceState {
    pub fn new(name: impl Into<String>) -> Self {
        let (phase, _) = watch::channel(Phase::Registered);
        Self {
            name: name.into(),
            phase,
            container_id: Mutex::new(None),
            health: RwLock::new(None),
            restarts: AtomicU32::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Apply a phase transition, rejecting ones the state machine forbids.
    /// Returns whether the transition was applied.
    pub fn set_phase(&self, to: Phase) -> bool {
        let from = self.phase();
        if !from.is_valid_transition(to) {
            tracing::warn!(
                "Ignoring invalid phase transition {} -> {} for service '{}'",
                from,
                to,
                self.name
            );
            return false;
        }
        if from != to {
            tracing::debug!("Service '{}' phase {} -> {}", self.name, from, to);
            self.phase.send_replace(to);
        }
        true
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub fn container_id(&self) -> Option<String> {
        self.container_id.lock().expect("state lock poisoned").clone()
    }

    pub fn set_container_id(&self, id: Option<String>) {
        *self.container_id.lock().expect("state lock poisoned") = id;
    }

    pub fn health(&self) -> Option<HealthResult> {
        self.health.read().expect("state lock poisoned").clone()
    }

    pub fn store_health(&self, result: HealthResult) {
        *self.health.write().expect("state lock poisoned") = Some(result);
    }

    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::Relaxed)
    }

    pub fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            phase: self.phase(),
            container_id: self.container_id(),
            health: self.health(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typical_lifecycle_is_valid() {
        assert!(Phase::Registered.is_valid_transition(Phase::Starting));
        assert!(Phase::Starting.is_valid_transition(Phase::Running));
        assert!(Phase::Running.is_valid_transition(Phase::Stopping));
        assert!(Phase::Stopping.is_valid_transition(Phase::Stopped));
        assert!(Phase::Stopped.is_valid_transition(Phase::Starting));
    }

    #[test]
    fn degraded_is_never_skipped() {
        assert!(!Phase::Running.is_valid_transition(Phase::Failed));
        assert!(Phase::Running.is_valid_transition(Phase::Degraded));
        assert!(Phase::Degraded.is_valid_transition(Phase::Failed));
    }

    #[test]
    fn failed_can_be_restarted_or_torn_down() {
        assert!(Phase::Failed.is_valid_transition(Phase::Starting));
        assert!(Phase::Failed.is_valid_transition(Phase::Stopping));
        assert!(!Phase::Failed.is_valid_transition(Phase::Running));
    }

    #[test]
    fn stopped_requires_passing_through_stopping() {
        assert!(!Phase::Running.is_valid_transition(Phase::Stopped));
        assert!(!Phase::Starting.is_valid_transition(Phase::Stopped));
        assert!(!Phase::Degraded.is_valid_transition(Phase::Stopped));
    }

    #[test]
    fn same_phase_is_a_noop() {
        for phase in [
            Phase::Registered,
            Phase::Starting,
            Phase::Running,
            Phase::Degraded,
            Phase::Stopping,
            Phase::Stopped,
            Phase::Failed,
        ] {
            assert!(phase.is_valid_transition(phase));
        }
    }

    #[test]
    fn state_rejects_invalid_transition() {
        let state = ServiceState::new("search-index");
        assert_eq!(state.phase(), Phase::Registered);
        assert!(!state.set_phase(Phase::Running));
        assert_eq!(state.phase(), Phase::Registered);
        assert!(state.set_phase(Phase::Starting));
        assert_eq!(state.phase(), Phase::Starting);
    }

    #[test]
    fn monitored_phases() {
        assert!(Phase::Starting.is_monitored());
        assert!(Phase::Running.is_monitored());
        assert!(Phase::Degraded.is_monitored());
        assert!(!Phase::Stopped.is_monitored());
        assert!(!Phase::Failed.is_monitored());
    }
}
