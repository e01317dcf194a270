//! Tokio-backed alarm facility for desktop and CLI hosts.

use super::{AlarmFacility, RefreshScheduler, ScheduleError, ScheduleHandle, TimerKind};
use crate::clock::Clock;
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Longest single sleep; the wall clock is re-checked after each slice so
/// suspend/resume and clock changes are picked up.
const MAX_SLEEP_SLICE: Duration = Duration::from_secs(60);

/// One tokio task per timer kind, reporting fires over an mpsc channel.
pub struct TokioAlarmFacility {
    runtime: Handle,
    clock: Arc<dyn Clock>,
    fired_tx: mpsc::UnboundedSender<ScheduleHandle>,
    tasks: Mutex<HashMap<TimerKind, JoinHandle<()>>>,
}

impl TokioAlarmFacility {
    /// Creates the facility and the receiver that
    /// [`run_alarm_dispatch`] consumes.
    pub fn new(
        runtime: Handle,
        clock: Arc<dyn Clock>,
    ) -> (Self, mpsc::UnboundedReceiver<ScheduleHandle>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let facility = Self {
            runtime,
            clock,
            fired_tx,
            tasks: Mutex::new(HashMap::new()),
        };
        (facility, fired_rx)
    }
}

impl AlarmFacility for TokioAlarmFacility {
    fn schedule(&self, handle: &ScheduleHandle) -> Result<(), ScheduleError> {
        let handle = *handle;
        let clock = Arc::clone(&self.clock);
        let fired_tx = self.fired_tx.clone();

        let task = self.runtime.spawn(async move {
            loop {
                let remaining_ms = handle.trigger_at_ms.saturating_sub(clock.now_ms());
                if remaining_ms <= 0 {
                    break;
                }
                let remaining = Duration::from_millis(remaining_ms.unsigned_abs());
                tokio::time::sleep(remaining.min(MAX_SLEEP_SLICE)).await;
            }
            // Receiver gone means the host is shutting down.
            let _ = fired_tx.send(handle);
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = tasks.insert(handle.kind, task) {
            previous.abort();
        }
        Ok(())
    }

    fn cancel(&self, kind: TimerKind) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = tasks.remove(&kind) {
            task.abort();
        }
    }
}

impl Drop for TokioAlarmFacility {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, task) in tasks.drain() {
            task.abort();
        }
    }
}

/// Feeds fired handles into the scheduler until the channel closes.
pub async fn run_alarm_dispatch(
    scheduler: Arc<RefreshScheduler>,
    mut fired_rx: mpsc::UnboundedReceiver<ScheduleHandle>,
) {
    while let Some(fired) = fired_rx.recv().await {
        let outcome = scheduler.handle_fire(&fired);
        debug!(
            "event=alarm_dispatch module=schedule status=ok kind={} generation={} outcome={:?}",
            fired.kind.as_str(),
            fired.generation,
            outcome
        );
    }
}

#[cfg(test)]
mod tests {
    use super::TokioAlarmFacility;
    use crate::clock::ManualClock;
    use crate::schedule::{AlarmFacility, ScheduleHandle, TimerKind};
    use chrono::FixedOffset;
    use std::sync::Arc;
    use std::time::Duration;

    const NOW_MS: i64 = 1_700_000_000_000;

    fn handle(kind: TimerKind, generation: u64, trigger_at_ms: i64) -> ScheduleHandle {
        ScheduleHandle {
            kind,
            generation,
            trigger_at_ms,
            recurring: kind == TimerKind::Periodic,
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            FixedOffset::east_opt(9 * 3600).unwrap(),
            NOW_MS,
        ))
    }

    #[tokio::test]
    async fn due_handle_is_delivered() {
        let (facility, mut fired_rx) =
            TokioAlarmFacility::new(tokio::runtime::Handle::current(), clock());

        let due = handle(TimerKind::Midnight, 1, NOW_MS - 1);
        facility.schedule(&due).unwrap();

        let fired = tokio::time::timeout(Duration::from_secs(5), fired_rx.recv())
            .await
            .unwrap();
        assert_eq!(fired, Some(due));
    }

    #[tokio::test]
    async fn replacing_a_kind_aborts_the_previous_task() {
        let (facility, mut fired_rx) =
            TokioAlarmFacility::new(tokio::runtime::Handle::current(), clock());

        facility
            .schedule(&handle(TimerKind::Periodic, 1, NOW_MS + 3_600_000))
            .unwrap();
        let replacement = handle(TimerKind::Periodic, 2, NOW_MS);
        facility.schedule(&replacement).unwrap();

        let fired = tokio::time::timeout(Duration::from_secs(5), fired_rx.recv())
            .await
            .unwrap();
        assert_eq!(fired, Some(replacement));
    }

    #[tokio::test]
    async fn cancelled_kind_never_fires() {
        let (facility, mut fired_rx) =
            TokioAlarmFacility::new(tokio::runtime::Handle::current(), clock());

        facility
            .schedule(&handle(TimerKind::Midnight, 1, NOW_MS + 50))
            .unwrap();
        facility.cancel(TimerKind::Midnight);
        drop(facility);

        assert_eq!(fired_rx.recv().await, None);
    }
}
