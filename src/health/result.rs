//! Structured output of one health poll cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
    /// Failure detail, empty on pass.
    #[serde(default)]
    pub message: String,
}

impl CheckOutcome {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: String::new(),
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
        }
    }
}

/// Derived classification of a full poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateStatus {
    Healthy,
    Unhealthy,
}

/// Result of one poll cycle for one service.
///
/// Produced fresh every cycle and stored by wholesale replacement; concurrent
/// readers always see a complete, consistent result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResult {
    pub service: String,
    pub container_id: String,
    /// Outcomes in check-declaration order.
    pub checks: Vec<CheckOutcome>,
    pub checked_at: DateTime<Utc>,
}

impl HealthResult {
    pub fn new(
        service: impl Into<String>,
        container_id: impl Into<String>,
        checks: Vec<CheckOutcome>,
    ) -> Self {
        Self {
            service: service.into(),
            container_id: container_id.into(),
            checks,
            checked_at: Utc::now(),
        }
    }

    /// Healthy only if every check passed. A service with no declared checks
    /// is vacuously healthy; container liveness is the runtime's concern.
    pub fn status(&self) -> AggregateStatus {
        if self.checks.iter().all(|c| c.passed) {
            AggregateStatus::Healthy
        } else {
            AggregateStatus::Unhealthy
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status() == AggregateStatus::Healthy
    }

    /// The checks that failed this cycle, in declaration order.
    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|c| !c.passed)
    }
}
