//! Calendar period boundaries.
//!
//! # Responsibility
//! - Compute day, ISO week and month boundaries for an instant in its own
//!   timezone.
//!
//! # Invariants
//! - Weeks start on Monday 00:00 local time.
//! - Every range ends one nanosecond before the next period starts, so
//!   adjacent ranges never overlap and every instant falls in exactly one.
//! - `CalendarPeriod::span` windows are half-open and end where the next
//!   period starts.
//! - Local midnight inside a DST gap resolves to the first valid wall time
//!   of that date; an ambiguous midnight resolves to its earliest instant.

use crate::model::event::TimeSpan;
use chrono::{
    DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Utc, Weekday,
};

/// Upper bound for walking forward through a DST gap, in minutes.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Calendar period used by range listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarPeriod {
    Day,
    Week,
    Month,
}

impl CalendarPeriod {
    /// Returns `(start, end)` of the period containing `t`, in `t`'s zone.
    pub fn range<Tz: TimeZone>(self, t: &DateTime<Tz>) -> (DateTime<Tz>, DateTime<Tz>) {
        match self {
            Self::Day => day_range(t),
            Self::Week => week_range(t),
            Self::Month => month_range(t),
        }
    }

    /// Returns the period containing `t` as a half-open UTC query window.
    ///
    /// The window ends at the next period's start, so an event beginning on
    /// the last nanosecond of the period still overlaps it.
    pub fn span<Tz: TimeZone>(self, t: &DateTime<Tz>) -> TimeSpan {
        let (start, last) = self.range(t);
        let last = last.with_timezone(&Utc);
        TimeSpan {
            start: start.with_timezone(&Utc),
            end: last
                .checked_add_signed(Duration::nanoseconds(1))
                .unwrap_or(last),
        }
    }

    /// Short lowercase name used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

/// Start of `t`'s calendar date (00:00:00.000000000).
pub fn start_of_day<Tz: TimeZone>(t: &DateTime<Tz>) -> DateTime<Tz> {
    local_midnight(&t.timezone(), t.date_naive())
}

/// Last nanosecond of `t`'s calendar date.
pub fn end_of_day<Tz: TimeZone>(t: &DateTime<Tz>) -> DateTime<Tz> {
    let next = add_days(t.date_naive(), 1);
    one_tick_before(local_midnight(&t.timezone(), next))
}

/// `(start_of_day(t), end_of_day(t))`.
pub fn day_range<Tz: TimeZone>(t: &DateTime<Tz>) -> (DateTime<Tz>, DateTime<Tz>) {
    (start_of_day(t), end_of_day(t))
}

/// Monday 00:00 of `t`'s ISO week through the last nanosecond of Sunday.
pub fn week_range<Tz: TimeZone>(t: &DateTime<Tz>) -> (DateTime<Tz>, DateTime<Tz>) {
    let tz = t.timezone();
    let monday = iso_week_monday(t.date_naive());
    let start = local_midnight(&tz, monday);
    let end = one_tick_before(local_midnight(&tz, add_days(monday, 7)));
    (start, end)
}

/// Day 1 00:00 of `t`'s month through the last nanosecond of the month.
pub fn month_range<Tz: TimeZone>(t: &DateTime<Tz>) -> (DateTime<Tz>, DateTime<Tz>) {
    let tz = t.timezone();
    let date = t.date_naive();
    let first = date.with_day(1).unwrap_or(date);
    let next_first = first
        .checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX);
    let start = local_midnight(&tz, first);
    let end = one_tick_before(local_midnight(&tz, next_first));
    (start, end)
}

fn iso_week_monday(date: NaiveDate) -> NaiveDate {
    let week = date.iso_week();
    NaiveDate::from_isoywd_opt(week.year(), week.week(), Weekday::Mon).unwrap_or_else(|| {
        let back = u64::from(date.weekday().num_days_from_monday());
        date.checked_sub_days(Days::new(back))
            .unwrap_or(NaiveDate::MIN)
    })
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days))
        .unwrap_or(NaiveDate::MAX)
}

fn one_tick_before<Tz: TimeZone>(t: DateTime<Tz>) -> DateTime<Tz> {
    t - Duration::nanoseconds(1)
}

fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let midnight = date.and_time(NaiveTime::MIN);
    let mut candidate = midnight;
    for _ in 0..MAX_GAP_MINUTES {
        if let Some(resolved) = tz.from_local_datetime(&candidate).earliest() {
            return resolved;
        }
        candidate = next_minute(candidate);
    }
    tz.from_utc_datetime(&midnight)
}

fn next_minute(value: NaiveDateTime) -> NaiveDateTime {
    value
        .checked_add_signed(Duration::minutes(1))
        .unwrap_or(value)
}
