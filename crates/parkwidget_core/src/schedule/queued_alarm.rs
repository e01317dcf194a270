//! Alarm facility drained by an external host.
//!
//! Mobile hosts own the real alarm manager: they periodically take the
//! queued requests, apply them, and report fires back with the kind and
//! generation they were registered with.

use super::{AlarmFacility, ScheduleError, ScheduleHandle, TimerKind};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmRequest {
    Schedule(ScheduleHandle),
    Cancel(TimerKind),
}

#[derive(Debug, Default)]
pub struct QueuedAlarmFacility {
    pending: Mutex<Vec<AlarmRequest>>,
}

impl QueuedAlarmFacility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every request queued so far, oldest first.
    pub fn take_requests(&self) -> Vec<AlarmRequest> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *pending)
    }

    fn push(&self, request: AlarmRequest) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
    }
}

impl AlarmFacility for QueuedAlarmFacility {
    fn schedule(&self, handle: &ScheduleHandle) -> Result<(), ScheduleError> {
        self.push(AlarmRequest::Schedule(*handle));
        Ok(())
    }

    fn cancel(&self, kind: TimerKind) {
        self.push(AlarmRequest::Cancel(kind));
    }
}

#[cfg(test)]
mod tests {
    use super::{AlarmRequest, QueuedAlarmFacility};
    use crate::schedule::{AlarmFacility, ScheduleHandle, TimerKind};

    #[test]
    fn take_requests_drains_in_order() {
        let facility = QueuedAlarmFacility::new();
        let handle = ScheduleHandle {
            kind: TimerKind::Midnight,
            generation: 4,
            trigger_at_ms: 1_700_000_000_000,
            recurring: false,
        };

        facility.schedule(&handle).unwrap();
        facility.cancel(TimerKind::Periodic);

        assert_eq!(
            facility.take_requests(),
            vec![
                AlarmRequest::Schedule(handle),
                AlarmRequest::Cancel(TimerKind::Periodic)
            ]
        );
        assert!(facility.take_requests().is_empty());
    }
}
