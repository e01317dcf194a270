//! Wall-clock and local calendar access.
//!
//! # Responsibility
//! - Provide an injectable source of "now" for scheduling and formatting.
//! - Resolve local calendar days and the next local midnight for a zone.
//!
//! # Invariants
//! - `next_local_midnight(t)` is strictly greater than `t`.
//! - Out-of-range epoch values clamp to the Unix epoch instead of panicking.

use chrono::{
    DateTime, Duration as ChronoDuration, FixedOffset, Local, LocalResult, NaiveDateTime,
    NaiveTime, TimeZone, Utc,
};
use std::sync::atomic::{AtomicI64, Ordering};

/// Upper bound when searching forward out of a DST gap.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Time source used by the scheduler, coordinator and formatters.
pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds.
    fn now_ms(&self) -> i64;
    /// Local wall-clock time for an epoch instant.
    fn to_local(&self, epoch_ms: i64) -> NaiveDateTime;
    /// First local midnight strictly after `after_ms`, as epoch milliseconds.
    fn next_local_midnight(&self, after_ms: i64) -> i64;
}

/// System clock in the device's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn to_local(&self, epoch_ms: i64) -> NaiveDateTime {
        local_naive(epoch_ms, &Local)
    }

    fn next_local_midnight(&self, after_ms: i64) -> i64 {
        next_local_midnight(after_ms, &Local)
    }
}

/// Manually driven clock with a fixed UTC offset.
///
/// Used by tests and by hosts that replay alarm deliveries.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicI64,
    offset: FixedOffset,
}

impl ManualClock {
    pub fn new(offset: FixedOffset, now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
            offset,
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn to_local(&self, epoch_ms: i64) -> NaiveDateTime {
        local_naive(epoch_ms, &self.offset)
    }

    fn next_local_midnight(&self, after_ms: i64) -> i64 {
        next_local_midnight(after_ms, &self.offset)
    }
}

/// Local wall-clock time of `epoch_ms` in `tz`.
pub fn local_naive<Tz: TimeZone>(epoch_ms: i64, tz: &Tz) -> NaiveDateTime {
    let utc = Utc
        .timestamp_millis_opt(epoch_ms)
        .single()
        .unwrap_or_default();
    utc.with_timezone(tz).naive_local()
}

/// First local midnight in `tz` strictly after `after_ms`.
///
/// An ambiguous midnight (clocks fall back across 00:00) resolves to its
/// earliest instant; a skipped midnight resolves to the first valid local
/// instant after it.
pub fn next_local_midnight<Tz: TimeZone>(after_ms: i64, tz: &Tz) -> i64 {
    let mut day = local_naive(after_ms, tz).date();
    for _ in 0..3 {
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
        let candidate = resolve_local(day.and_time(NaiveTime::MIN), tz);
        if candidate > after_ms {
            return candidate;
        }
    }
    // Only reachable at the far end of chrono's date range.
    after_ms.saturating_add(ChronoDuration::days(1).num_milliseconds())
}

fn resolve_local<Tz: TimeZone>(naive: NaiveDateTime, tz: &Tz) -> i64 {
    for minutes in 0..=MAX_GAP_MINUTES {
        let shifted = naive + ChronoDuration::minutes(minutes);
        match tz.from_local_datetime(&shifted) {
            LocalResult::Single(dt) => return dt.timestamp_millis(),
            LocalResult::Ambiguous(earliest, _) => return earliest.timestamp_millis(),
            LocalResult::None => continue,
        }
    }
    DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc).timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::{local_naive, next_local_midnight};
    use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};
    use chrono_tz::America::{Havana, Sao_Paulo};

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn kst_ms(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32, ms: u32) -> i64 {
        let naive = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_milli_opt(h, mi, s, ms)
            .unwrap();
        kst().from_local_datetime(&naive).unwrap().timestamp_millis()
    }

    #[test]
    fn midnight_exactly_targets_following_day() {
        let at_midnight = kst_ms(2024, 3, 10, 0, 0, 0, 0);
        assert_eq!(
            next_local_midnight(at_midnight, &kst()),
            kst_ms(2024, 3, 11, 0, 0, 0, 0)
        );
    }

    #[test]
    fn month_and_year_rollover() {
        let new_years_eve = kst_ms(2024, 12, 31, 18, 30, 0, 0);
        assert_eq!(
            next_local_midnight(new_years_eve, &kst()),
            kst_ms(2025, 1, 1, 0, 0, 0, 0)
        );
    }

    fn utc_ms(y: i32, m: u32, d: u32, h: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn skipped_midnight_resolves_to_first_valid_instant() {
        // Sao Paulo jumped from 00:00 to 01:00 on 2018-11-04.
        let afternoon_before = utc_ms(2018, 11, 3, 15);
        assert_eq!(
            next_local_midnight(afternoon_before, &Sao_Paulo),
            utc_ms(2018, 11, 4, 3)
        );
    }

    #[test]
    fn ambiguous_midnight_resolves_to_earliest_instant_once() {
        // Havana fell back from 01:00 CDT to 00:00 CST on 2019-11-03.
        let afternoon_before = utc_ms(2019, 11, 2, 16);
        let first = next_local_midnight(afternoon_before, &Havana);
        assert_eq!(first, utc_ms(2019, 11, 3, 4));

        // The repeated 00:00 CST is not a second midnight.
        assert_eq!(next_local_midnight(first, &Havana), utc_ms(2019, 11, 4, 5));
    }

    #[test]
    fn local_naive_applies_offset() {
        let naive = local_naive(0, &kst());
        assert_eq!(naive.to_string(), "1970-01-01 09:00:00");
    }
}
