//! Time-based refresh scheduling.
//!
//! # Responsibility
//! - Keep a periodic freshness timer and a local-midnight timer armed.
//! - Translate timer fires into refresh requests.
//! - Abstract the platform alarm facility behind [`AlarmFacility`].
//!
//! # Invariants
//! - Each timer kind has at most one live registration; re-arming replaces.
//! - A fire is honored only if it carries the currently armed generation.
//! - Re-arm times are computed from "now", never from the previous target.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod handle;
mod queued_alarm;
mod scheduler;
mod tokio_alarm;

pub use handle::{ScheduleHandle, TimerKind};
pub use queued_alarm::{AlarmRequest, QueuedAlarmFacility};
pub use scheduler::{FireOutcome, RefreshScheduler, DEFAULT_PERIODIC_INTERVAL};
pub use tokio_alarm::{run_alarm_dispatch, TokioAlarmFacility};

/// Platform alarm facility could not take a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    Rejected { kind: TimerKind, reason: String },
}

impl Display for ScheduleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected { kind, reason } => {
                write!(f, "alarm for `{}` rejected: {reason}", kind.as_str())
            }
        }
    }
}

impl Error for ScheduleError {}

/// Platform alarm/timer facility.
///
/// Implementations deliver a fired [`ScheduleHandle`] back to
/// [`RefreshScheduler::handle_fire`] at or after its trigger time.
pub trait AlarmFacility: Send + Sync {
    /// Registers `handle`, replacing any registration of the same kind.
    ///
    /// Non-recurring handles need exact, wake-capable delivery; recurring
    /// handles tolerate inexact delivery.
    fn schedule(&self, handle: &ScheduleHandle) -> Result<(), ScheduleError>;

    /// Drops the registration of `kind`. No-op when none exists.
    fn cancel(&self, kind: TimerKind);
}
