//! Refresh scheduler state machine.
//!
//! # Responsibility
//! - Arm, re-arm and disarm the periodic and midnight timers.
//! - Validate fires against the armed generation and request refreshes.
//!
//! # Invariants
//! - Slot state and facility registration change under one lock, so a fire
//!   handled concurrently with a disarm sees either the armed or the
//!   disarmed state, never a half-updated one.
//! - Disarming an already disarmed timer is a no-op.

use super::{AlarmFacility, ScheduleError, ScheduleHandle, TimerKind};
use crate::clock::Clock;
use crate::refresh::{RefreshNotifier, RefreshReason};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const DEFAULT_PERIODIC_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// What [`RefreshScheduler::handle_fire`] did with a delivered fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// Refresh requested; `next` is the replacement registration, `None`
    /// when re-arming failed and the timer is now disarmed.
    Refreshed { next: Option<ScheduleHandle> },
    /// Fire did not match the armed registration and was dropped.
    Stale,
}

#[derive(Debug)]
struct TimerSlot {
    armed: Option<ScheduleHandle>,
    next_generation: u64,
}

#[derive(Debug)]
struct Slots {
    periodic: TimerSlot,
    midnight: TimerSlot,
}

impl Slots {
    /// Generations start at the construction time so registrations left
    /// over from an earlier process never match a fresh one.
    fn seeded(now_ms: i64) -> Self {
        let seed = u64::try_from(now_ms).unwrap_or(0);
        Self {
            periodic: TimerSlot {
                armed: None,
                next_generation: seed,
            },
            midnight: TimerSlot {
                armed: None,
                next_generation: seed,
            },
        }
    }

    fn get_mut(&mut self, kind: TimerKind) -> &mut TimerSlot {
        match kind {
            TimerKind::Periodic => &mut self.periodic,
            TimerKind::Midnight => &mut self.midnight,
        }
    }

    fn get(&self, kind: TimerKind) -> &TimerSlot {
        match kind {
            TimerKind::Periodic => &self.periodic,
            TimerKind::Midnight => &self.midnight,
        }
    }
}

/// Owner of the two refresh timers.
pub struct RefreshScheduler {
    alarms: Arc<dyn AlarmFacility>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn RefreshNotifier>,
    periodic_interval_ms: i64,
    slots: Mutex<Slots>,
}

impl RefreshScheduler {
    pub fn new(
        alarms: Arc<dyn AlarmFacility>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn RefreshNotifier>,
        periodic_interval: Duration,
    ) -> Self {
        let periodic_interval_ms = i64::try_from(periodic_interval.as_millis())
            .unwrap_or(i64::MAX)
            .max(1);
        let slots = Slots::seeded(clock.now_ms());
        Self {
            alarms,
            clock,
            notifier,
            periodic_interval_ms,
            slots: Mutex::new(slots),
        }
    }

    /// Cold start: unconditionally (re)arms both timers.
    ///
    /// Safe to call on every process start; registrations replace any left
    /// over from a previous process.
    ///
    /// Both kinds are attempted even when one is rejected; the first
    /// rejection is returned afterwards.
    pub fn start(&self) -> Result<(), ScheduleError> {
        let periodic = self.arm(TimerKind::Periodic);
        let midnight = self.arm(TimerKind::Midnight);
        match (periodic, midnight) {
            (Ok(periodic), Ok(midnight)) => {
                info!(
                    "event=scheduler_start module=schedule status=ok periodic_at={} midnight_at={}",
                    periodic.trigger_at_ms, midnight.trigger_at_ms
                );
                Ok(())
            }
            (Err(err), _) | (Ok(_), Err(err)) => {
                warn!(
                    "event=scheduler_start module=schedule status=error periodic_armed={} midnight_armed={} error={}",
                    self.current(TimerKind::Periodic).is_some(),
                    self.current(TimerKind::Midnight).is_some(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Disarms both timers.
    pub fn stop(&self) {
        self.disarm(TimerKind::Periodic);
        self.disarm(TimerKind::Midnight);
    }

    /// Arms `kind` from the current time, replacing any armed registration.
    pub fn arm(&self, kind: TimerKind) -> Result<ScheduleHandle, ScheduleError> {
        let now = self.clock.now_ms();
        let mut slots = self.lock_slots();
        self.arm_locked(&mut slots, kind, now)
    }

    /// Disarms `kind`. Returns whether a registration was armed.
    pub fn disarm(&self, kind: TimerKind) -> bool {
        let mut slots = self.lock_slots();
        let slot = slots.get_mut(kind);
        let Some(handle) = slot.armed.take() else {
            return false;
        };
        self.alarms.cancel(kind);
        debug!(
            "event=timer_disarm module=schedule status=ok kind={} generation={}",
            kind.as_str(),
            handle.generation
        );
        true
    }

    /// Currently armed registration of `kind`.
    pub fn current(&self, kind: TimerKind) -> Option<ScheduleHandle> {
        self.lock_slots().get(kind).armed
    }

    /// Handles a fire delivered by the alarm facility.
    ///
    /// A matching fire requests a refresh, then re-arms the same kind.
    /// Anything else (disarmed timer, superseded generation, duplicate
    /// delivery) is ignored.
    pub fn handle_fire(&self, fired: &ScheduleHandle) -> FireOutcome {
        let mut slots = self.lock_slots();
        let is_current = slots
            .get(fired.kind)
            .armed
            .is_some_and(|armed| armed.generation == fired.generation);
        if !is_current {
            debug!(
                "event=timer_fire module=schedule status=skipped kind={} generation={} reason=stale",
                fired.kind.as_str(),
                fired.generation
            );
            return FireOutcome::Stale;
        }

        let reason = match fired.kind {
            TimerKind::Periodic => RefreshReason::Periodic,
            TimerKind::Midnight => RefreshReason::Midnight,
        };
        self.notifier.request_refresh(reason);

        // An early delivery must not target the midnight it was armed for again.
        let now = match fired.kind {
            TimerKind::Periodic => self.clock.now_ms(),
            TimerKind::Midnight => self.clock.now_ms().max(fired.trigger_at_ms),
        };
        match self.arm_locked(&mut slots, fired.kind, now) {
            Ok(next) => FireOutcome::Refreshed { next: Some(next) },
            Err(err) => {
                error!(
                    "event=timer_rearm module=schedule status=error kind={} error={}",
                    fired.kind.as_str(),
                    err
                );
                slots.get_mut(fired.kind).armed = None;
                FireOutcome::Refreshed { next: None }
            }
        }
    }

    fn arm_locked(
        &self,
        slots: &mut Slots,
        kind: TimerKind,
        now: i64,
    ) -> Result<ScheduleHandle, ScheduleError> {
        let slot = slots.get_mut(kind);
        let generation = slot.next_generation;
        slot.next_generation += 1;

        let handle = ScheduleHandle {
            kind,
            generation,
            trigger_at_ms: self.next_trigger(kind, now),
            recurring: kind == TimerKind::Periodic,
        };

        if let Err(err) = self.alarms.schedule(&handle) {
            warn!(
                "event=timer_arm module=schedule status=error kind={} generation={} error={}",
                kind.as_str(),
                generation,
                err
            );
            return Err(err);
        }
        slot.armed = Some(handle);
        debug!(
            "event=timer_arm module=schedule status=ok kind={} generation={} trigger_at={}",
            kind.as_str(),
            generation,
            handle.trigger_at_ms
        );
        Ok(handle)
    }

    fn next_trigger(&self, kind: TimerKind, now: i64) -> i64 {
        match kind {
            TimerKind::Periodic => now.saturating_add(self.periodic_interval_ms),
            TimerKind::Midnight => self.clock.next_local_midnight(now),
        }
    }

    fn lock_slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
