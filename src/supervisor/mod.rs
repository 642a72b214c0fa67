mod core;
mod lifecycle;
mod policy;

pub use core::{Manager, ManagerBuilder, DEFAULT_STOP_GRACE};
pub use lifecycle::{StartOutcome, StartSummary};
pub use policy::{FailureAction, FailurePolicy, LeaveForOperator, RestartOnFailure};
