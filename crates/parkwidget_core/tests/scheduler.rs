mod support;

use parkwidget_core::refresh::{RefreshError, RefreshNotifier, RefreshReason};
use parkwidget_core::schedule::{FireOutcome, RefreshScheduler, ScheduleError, TimerKind};
use parkwidget_core::{Clock, RenderReport};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use support::{kst_ms, manual_clock, AlarmCall, RecordingAlarms};

const DAY_MS: i64 = 86_400_000;
const FIFTEEN_MIN_MS: i64 = 15 * 60 * 1000;

#[derive(Default)]
struct RecordingNotifier {
    reasons: Mutex<Vec<RefreshReason>>,
}

impl RecordingNotifier {
    fn reasons(&self) -> Vec<RefreshReason> {
        self.reasons.lock().unwrap().clone()
    }
}

impl RefreshNotifier for RecordingNotifier {
    fn request_refresh(&self, reason: RefreshReason) {
        self.reasons.lock().unwrap().push(reason);
    }

    fn refresh_blocking(&self, _reason: RefreshReason) -> Result<RenderReport, RefreshError> {
        Err(RefreshError::WorkerStopped)
    }
}

struct Harness {
    clock: Arc<parkwidget_core::ManualClock>,
    alarms: Arc<RecordingAlarms>,
    notifier: Arc<RecordingNotifier>,
    scheduler: RefreshScheduler,
}

fn harness(now_ms: i64) -> Harness {
    let clock = manual_clock(now_ms);
    let alarms = RecordingAlarms::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler = RefreshScheduler::new(
        alarms.clone(),
        clock.clone(),
        notifier.clone(),
        Duration::from_secs(15 * 60),
    );
    Harness {
        clock,
        alarms,
        notifier,
        scheduler,
    }
}

#[test]
fn start_arms_both_timers() {
    let now = kst_ms(2024, 3, 10, 14, 30, 0, 0);
    let h = harness(now);

    h.scheduler.start().unwrap();

    let periodic = h.scheduler.current(TimerKind::Periodic).unwrap();
    assert_eq!(periodic.trigger_at_ms, now + FIFTEEN_MIN_MS);
    assert!(periodic.recurring);
    let midnight = h.scheduler.current(TimerKind::Midnight).unwrap();
    assert_eq!(midnight.trigger_at_ms, kst_ms(2024, 3, 11, 0, 0, 0, 0));
    assert!(!midnight.recurring);
}

#[test]
fn cold_start_twice_replaces_registrations() {
    let h = harness(kst_ms(2024, 3, 10, 9, 0, 0, 0));
    h.scheduler.start().unwrap();
    let first = h.scheduler.current(TimerKind::Periodic).unwrap();

    h.scheduler.start().unwrap();
    let second = h.scheduler.current(TimerKind::Periodic).unwrap();

    assert!(second.generation > first.generation);
    // The stale registration from the first start no longer fires.
    assert_eq!(h.scheduler.handle_fire(&first), FireOutcome::Stale);
    assert!(h.notifier.reasons().is_empty());
}

#[test]
fn midnight_rearmed_just_before_midnight_targets_the_next_one() {
    let h = harness(kst_ms(2024, 3, 10, 23, 59, 59, 999));
    let handle = h.scheduler.arm(TimerKind::Midnight).unwrap();

    assert_eq!(handle.trigger_at_ms, kst_ms(2024, 3, 11, 0, 0, 0, 0));
    assert_eq!(handle.trigger_at_ms - h.clock.now_ms(), 1);
}

#[test]
fn midnight_rearmed_just_after_midnight_targets_the_following_day() {
    let h = harness(kst_ms(2024, 3, 11, 0, 0, 0, 1));
    let handle = h.scheduler.arm(TimerKind::Midnight).unwrap();

    assert_eq!(handle.trigger_at_ms, kst_ms(2024, 3, 12, 0, 0, 0, 0));
    assert_eq!(handle.trigger_at_ms - h.clock.now_ms(), DAY_MS - 1);
}

#[test]
fn midnight_fire_refreshes_and_rearms_for_the_following_midnight() {
    let h = harness(kst_ms(2024, 3, 10, 22, 0, 0, 0));
    let armed = h.scheduler.arm(TimerKind::Midnight).unwrap();

    h.clock.set(armed.trigger_at_ms);
    let outcome = h.scheduler.handle_fire(&armed);

    let FireOutcome::Refreshed { next: Some(next) } = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(h.notifier.reasons(), vec![RefreshReason::Midnight]);
    assert_eq!(next.trigger_at_ms, armed.trigger_at_ms + DAY_MS);
    assert!(next.trigger_at_ms > h.clock.now_ms());
}

#[test]
fn early_midnight_delivery_does_not_target_the_same_midnight_twice() {
    let h = harness(kst_ms(2024, 3, 10, 22, 0, 0, 0));
    let armed = h.scheduler.arm(TimerKind::Midnight).unwrap();

    // Inexact delivery a few seconds ahead of the target.
    h.clock.set(armed.trigger_at_ms - 3_000);
    let FireOutcome::Refreshed { next: Some(next) } = h.scheduler.handle_fire(&armed) else {
        panic!("fire should be honored");
    };
    assert_eq!(next.trigger_at_ms, armed.trigger_at_ms + DAY_MS);
}

#[test]
fn periodic_rearm_is_relative_to_now_not_previous_target() {
    let start = kst_ms(2024, 3, 10, 10, 0, 0, 0);
    let h = harness(start);
    let armed = h.scheduler.arm(TimerKind::Periodic).unwrap();

    // Delivered 40 minutes late (device dozing).
    h.clock.set(armed.trigger_at_ms + 40 * 60 * 1000);
    let FireOutcome::Refreshed { next: Some(next) } = h.scheduler.handle_fire(&armed) else {
        panic!("fire should be honored");
    };

    assert_eq!(next.trigger_at_ms, h.clock.now_ms() + FIFTEEN_MIN_MS);
    assert_eq!(h.notifier.reasons(), vec![RefreshReason::Periodic]);
}

#[test]
fn stale_fire_after_disarm_produces_no_refresh() {
    let h = harness(kst_ms(2024, 3, 10, 10, 0, 0, 0));
    h.scheduler.start().unwrap();
    let in_flight = h.scheduler.current(TimerKind::Periodic).unwrap();

    assert!(h.scheduler.disarm(TimerKind::Periodic));
    assert_eq!(h.scheduler.handle_fire(&in_flight), FireOutcome::Stale);

    assert!(h.notifier.reasons().is_empty());
    assert!(h.scheduler.current(TimerKind::Periodic).is_none());
}

#[test]
fn duplicate_delivery_of_one_fire_refreshes_once() {
    let h = harness(kst_ms(2024, 3, 10, 10, 0, 0, 0));
    let armed = h.scheduler.arm(TimerKind::Periodic).unwrap();

    assert!(matches!(
        h.scheduler.handle_fire(&armed),
        FireOutcome::Refreshed { .. }
    ));
    assert_eq!(h.scheduler.handle_fire(&armed), FireOutcome::Stale);
    assert_eq!(h.notifier.reasons().len(), 1);
}

#[test]
fn disarm_is_idempotent() {
    let h = harness(kst_ms(2024, 3, 10, 10, 0, 0, 0));
    h.scheduler.arm(TimerKind::Midnight).unwrap();

    assert!(h.scheduler.disarm(TimerKind::Midnight));
    assert!(!h.scheduler.disarm(TimerKind::Midnight));
    assert!(!h.scheduler.disarm(TimerKind::Periodic));

    assert_eq!(h.alarms.cancels(TimerKind::Midnight), 1);
    assert_eq!(h.alarms.cancels(TimerKind::Periodic), 0);
}

#[test]
fn stop_disarms_both_timers() {
    let h = harness(kst_ms(2024, 3, 10, 10, 0, 0, 0));
    h.scheduler.start().unwrap();
    h.scheduler.stop();

    assert!(h.scheduler.current(TimerKind::Periodic).is_none());
    assert!(h.scheduler.current(TimerKind::Midnight).is_none());
    let calls = h.alarms.calls();
    assert!(calls.contains(&AlarmCall::Cancel(TimerKind::Periodic)));
    assert!(calls.contains(&AlarmCall::Cancel(TimerKind::Midnight)));
}

#[test]
fn rejected_registration_leaves_timer_disarmed() {
    let h = harness(kst_ms(2024, 3, 10, 10, 0, 0, 0));
    h.alarms.set_reject(true);

    assert!(h.scheduler.start().is_err());
    assert!(h.scheduler.current(TimerKind::Periodic).is_none());
}

#[test]
fn rejected_periodic_still_arms_midnight_on_cold_start() {
    let h = harness(kst_ms(2024, 3, 10, 10, 0, 0, 0));
    h.alarms.reject_kind(Some(TimerKind::Periodic));

    let err = h.scheduler.start().unwrap_err();

    assert!(matches!(
        err,
        ScheduleError::Rejected {
            kind: TimerKind::Periodic,
            ..
        }
    ));
    assert!(h.scheduler.current(TimerKind::Periodic).is_none());
    let midnight = h.scheduler.current(TimerKind::Midnight).unwrap();
    assert_eq!(midnight.trigger_at_ms, kst_ms(2024, 3, 11, 0, 0, 0, 0));
}

#[test]
fn generations_from_an_earlier_process_are_stale() {
    let earlier = harness(kst_ms(2024, 3, 10, 10, 0, 0, 0));
    let leftover = earlier.scheduler.arm(TimerKind::Periodic).unwrap();

    let restarted = harness(kst_ms(2024, 3, 10, 10, 5, 0, 0));
    restarted.scheduler.start().unwrap();

    let current = restarted.scheduler.current(TimerKind::Periodic).unwrap();
    assert!(current.generation > leftover.generation);
    assert_eq!(restarted.scheduler.handle_fire(&leftover), FireOutcome::Stale);
    assert!(restarted.notifier.reasons().is_empty());
}

#[test]
fn failed_rearm_after_fire_still_refreshes_and_disarms() {
    let h = harness(kst_ms(2024, 3, 10, 10, 0, 0, 0));
    let armed = h.scheduler.arm(TimerKind::Midnight).unwrap();
    h.alarms.set_reject(true);

    let outcome = h.scheduler.handle_fire(&armed);

    assert_eq!(outcome, FireOutcome::Refreshed { next: None });
    assert_eq!(h.notifier.reasons(), vec![RefreshReason::Midnight]);
    assert!(h.scheduler.current(TimerKind::Midnight).is_none());
}
