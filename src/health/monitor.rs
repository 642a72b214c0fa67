//! Per-service health monitoring loop.
//!
//! One loop runs per service in a monitored phase (Starting, Running,
//! Degraded). Each cycle runs every declared check in sequence (a failed
//! check never skips the rest) and replaces the service's health result
//! wholesale. The loop owns phase transitions driven by health: it promotes
//! a Starting service on its first healthy cycle, fails it when the startup
//! deadline passes, degrades a Running service on a single failed cycle and
//! fails it after the configured number of consecutive failures. It never
//! touches the container itself.

use super::probe::{self, Probe};
use super::result::HealthResult;
use crate::definition::ServiceDefinition;
use crate::state::{Phase, ServiceState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Notification from a monitor loop to the supervisor.
#[derive(Debug)]
pub(crate) enum ServiceEvent {
    /// A Running service crossed its failure threshold and is now Failed.
    Failed {
        service: String,
        consecutive_failures: u32,
    },
}

/// A monitor bound to exactly one service.
pub(crate) struct Monitor {
    pub def: Arc<ServiceDefinition>,
    pub state: Arc<ServiceState>,
    pub events: mpsc::UnboundedSender<ServiceEvent>,
    pub cancel: CancellationToken,
}

impl Monitor {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let probes = probe::build_probes(&self.def);
        let spec = self.def.health();
        let per_check = spec.check_timeout();
        let threshold = spec.effective_threshold();

        let mut ticker = tokio::time::interval(spec.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if self.state.phase() == Phase::Starting
            && !self.await_first_healthy(&probes, per_check, &mut ticker).await
        {
            return;
        }

        self.watch_running(&probes, per_check, threshold, &mut ticker)
            .await;
    }

    /// Startup stage: poll until the first fully healthy cycle, or fail the
    /// start attempt when the deadline passes. Returns whether the service
    /// reached Running.
    async fn await_first_healthy(
        &self,
        probes: &[Box<dyn Probe>],
        per_check: Duration,
        ticker: &mut tokio::time::Interval,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + self.def.startup_timeout();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!(
                        "Service '{}' did not report healthy within {}s, abandoning start",
                        self.def.name(),
                        self.def.startup_timeout().as_secs()
                    );
                    self.state.set_phase(Phase::Failed);
                    return false;
                }
                _ = ticker.tick() => {
                    let result = self.poll_cycle(probes, per_check).await;
                    let healthy = result.is_healthy();
                    self.state.store_health(result);
                    if healthy {
                        tracing::info!("Service '{}' is healthy", self.def.name());
                        self.state.set_phase(Phase::Running);
                        return true;
                    }
                }
            }
        }
    }

    /// Steady-state stage: track health while Running/Degraded until the
    /// failure threshold is crossed or the loop is cancelled.
    async fn watch_running(
        &self,
        probes: &[Box<dyn Probe>],
        per_check: Duration,
        threshold: u32,
        ticker: &mut tokio::time::Interval,
    ) {
        let mut consecutive = 0u32;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = ticker.tick() => {
                    let result = self.poll_cycle(probes, per_check).await;
                    let healthy = result.is_healthy();
                    self.state.store_health(result);

                    if healthy {
                        if consecutive > 0 {
                            tracing::info!(
                                "Service '{}' recovered after {} failed cycles",
                                self.def.name(),
                                consecutive
                            );
                            self.state.set_phase(Phase::Running);
                        }
                        consecutive = 0;
                        continue;
                    }

                    consecutive += 1;
                    if consecutive == 1 {
                        tracing::warn!(
                            "Service '{}' failed a health cycle, marking degraded",
                            self.def.name()
                        );
                        self.state.set_phase(Phase::Degraded);
                    }
                    if consecutive >= threshold {
                        tracing::error!(
                            "Service '{}' failed {} consecutive health cycles",
                            self.def.name(),
                            consecutive
                        );
                        self.state.set_phase(Phase::Failed);
                        let _ = self.events.send(ServiceEvent::Failed {
                            service: self.def.name().to_string(),
                            consecutive_failures: consecutive,
                        });
                        return;
                    }
                }
            }
        }
    }

    /// Run every declared check in sequence, bounding each by the per-check
    /// timeout, and assemble a fresh result.
    async fn poll_cycle(&self, probes: &[Box<dyn Probe>], per_check: Duration) -> HealthResult {
        let container_id = self.state.container_id().unwrap_or_default();
        let mut outcomes = Vec::with_capacity(probes.len());
        for probe in probes {
            let outcome = match tokio::time::timeout(per_check, probe.run(&container_id)).await {
                Ok(outcome) => outcome,
                Err(_) => super::result::CheckOutcome::fail(
                    probe.name(),
                    format!("timed out after {}ms", per_check.as_millis()),
                ),
            };
            if !outcome.passed {
                tracing::debug!(
                    "Check '{}' failed for service '{}': {}",
                    outcome.name,
                    self.def.name(),
                    outcome.message
                );
            }
            outcomes.push(outcome);
        }
        HealthResult::new(self.def.name(), container_id, outcomes)
    }
}
