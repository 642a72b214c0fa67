//! What happens after a Running service is declared Failed.
//!
//! The monitor notifies the supervisor; the supervisor consults the
//! configured [`FailurePolicy`]. Startup timeouts never come through here;
//! an abandoned start attempt is left for the caller of `start` to handle.

use crate::health::monitor::ServiceEvent;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::core::Inner;

/// Decision for a failed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Keep the Failed phase visible and wait for operator intervention.
    Leave,
    /// Stop whatever is left of the container and run the start path again.
    Restart,
}

/// Pluggable reaction to a service crossing its failure threshold.
pub trait FailurePolicy: Send + Sync {
    /// `restarts_so_far` counts supervisor-initiated restarts already
    /// attempted for this service during this process lifetime.
    fn on_service_failed(&self, service: &str, restarts_so_far: u32) -> FailureAction;
}

/// Default policy: never restart automatically, leave Failed services for
/// operator tooling to inspect and act on.
pub struct LeaveForOperator;

impl FailurePolicy for LeaveForOperator {
    fn on_service_failed(&self, _service: &str, _restarts_so_far: u32) -> FailureAction {
        FailureAction::Leave
    }
}

/// Restart a failed service, optionally capping the number of attempts.
pub struct RestartOnFailure {
    /// `None` restarts without limit.
    pub max_restarts: Option<u32>,
}

impl FailurePolicy for RestartOnFailure {
    fn on_service_failed(&self, _service: &str, restarts_so_far: u32) -> FailureAction {
        match self.max_restarts {
            Some(max) if restarts_so_far >= max => FailureAction::Leave,
            _ => FailureAction::Restart,
        }
    }
}

/// Consume monitor events for the supervisor's lifetime.
///
/// Holds only a weak reference so dropping the [`Manager`](super::Manager)
/// ends the loop; cancellation via the root token covers orderly shutdown.
pub(super) fn spawn_event_loop(
    inner: &Arc<Inner>,
    mut events: mpsc::UnboundedReceiver<ServiceEvent>,
) -> JoinHandle<()> {
    let weak: Weak<Inner> = Arc::downgrade(inner);
    let cancel = inner.root_cancel.clone();

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            let Some(inner) = weak.upgrade() else { break };

            match event {
                ServiceEvent::Failed {
                    service,
                    consecutive_failures,
                } => {
                    let restarts = inner
                        .handle(&service)
                        .map(|h| h.state.restarts())
                        .unwrap_or(0);
                    match inner.policy.on_service_failed(&service, restarts) {
                        FailureAction::Leave => {
                            tracing::info!(
                                "Service '{}' failed after {} consecutive unhealthy cycles; \
                                 leaving for operator intervention",
                                service,
                                consecutive_failures
                            );
                        }
                        FailureAction::Restart => {
                            tracing::warn!(
                                "Service '{}' failed; restarting (attempt {})",
                                service,
                                restarts + 1
                            );
                            if let Ok(handle) = inner.handle(&service) {
                                handle.state.record_restart();
                            }
                            if let Err(err) = inner.restart_service(&service).await {
                                tracing::error!(
                                    "Failed to restart service '{}': {}",
                                    service,
                                    err
                                );
                            }
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leave_for_operator_never_restarts() {
        let policy = LeaveForOperator;
        assert_eq!(policy.on_service_failed("coordinator", 0), FailureAction::Leave);
        assert_eq!(policy.on_service_failed("coordinator", 5), FailureAction::Leave);
    }

    #[test]
    fn restart_unlimited() {
        let policy = RestartOnFailure { max_restarts: None };
        assert_eq!(policy.on_service_failed("search-index", 0), FailureAction::Restart);
        assert_eq!(
            policy.on_service_failed("search-index", 100),
            FailureAction::Restart
        );
    }

    #[test]
    fn restart_capped() {
        let policy = RestartOnFailure {
            max_restarts: Some(3),
        };
        assert_eq!(policy.on_service_failed("log-pipeline", 0), FailureAction::Restart);
        assert_eq!(policy.on_service_failed("log-pipeline", 2), FailureAction::Restart);
        assert_eq!(policy.on_service_failed("log-pipeline", 3), FailureAction::Leave);
        assert_eq!(policy.on_service_failed("log-pipeline", 10), FailureAction::Leave);
    }
}
