//! Relative save-time label.
//!
//! Pure formatting: callers pass `now` explicitly, so results never depend on
//! the wall clock.

use crate::clock::{local_naive, Clock};
use chrono::{NaiveDateTime, TimeZone, Timelike};

pub const DAY_MS: i64 = 86_400_000;

/// Formats `saved_at` relative to `now` in time zone `tz`.
///
/// - same local day: `오후 3:07 저장`
/// - previous local day: `어제 오전 9:00 저장`
/// - older: `N일 전`, N = whole elapsed days, at least 1
pub fn relative_time_label<Tz: TimeZone>(saved_at_ms: i64, now_ms: i64, tz: &Tz) -> String {
    label_from_local(
        local_naive(saved_at_ms, tz),
        local_naive(now_ms, tz),
        now_ms.saturating_sub(saved_at_ms),
    )
}

/// Same as [`relative_time_label`] using the zone of `clock`.
pub fn relative_time_label_for(clock: &dyn Clock, saved_at_ms: i64, now_ms: i64) -> String {
    label_from_local(
        clock.to_local(saved_at_ms),
        clock.to_local(now_ms),
        now_ms.saturating_sub(saved_at_ms),
    )
}

fn label_from_local(saved: NaiveDateTime, now: NaiveDateTime, elapsed_ms: i64) -> String {
    let day_diff = now.date().signed_duration_since(saved.date()).num_days();
    match day_diff {
        // Future saves (clock skew) show the absolute time of day.
        i64::MIN..=0 => clock_label(saved),
        1 => format!("어제 {}", clock_label(saved)),
        _ => format!("{}일 전", (elapsed_ms / DAY_MS).max(1)),
    }
}

fn clock_label(at: NaiveDateTime) -> String {
    let (is_pm, hour12) = at.hour12();
    let meridiem = if is_pm { "오후" } else { "오전" };
    format!("{meridiem} {hour12}:{:02} 저장", at.minute())
}
