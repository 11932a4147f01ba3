//! # Week Clock
//!
//! Weeks run Monday 00:00:00.000 through Sunday 23:59:59.999 on the server's
//! local wall clock. Week identity follows ISO 8601, so the key never changes
//! inside those bounds, including across the new year.
//!
//! ```text
//! 2025-12-29 (Mon) .. 2026-01-04 (Sun)  =>  "2026-W1"
//! 2026-01-05 (Mon) .. 2026-01-11 (Sun)  =>  "2026-W2"
//! ```
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::Serialize;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WeekInfo {
    pub year: i32,
    pub week_number: u32,
    pub key: String,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekBounds {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

pub fn week_key(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{}", iso.year(), iso.week())
}

pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Inclusive bounds of the week containing `now`, on the naive wall clock.
pub fn naive_bounds(now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    let start = monday_of(now.date()).and_time(NaiveTime::MIN);
    let end = start + Duration::days(7) - Duration::milliseconds(1);

    (start, end)
}

pub fn naive_next_week_start(now: NaiveDateTime) -> NaiveDateTime {
    monday_of(now.date()).and_time(NaiveTime::MIN) + Duration::days(7)
}

pub fn current_week(now: &DateTime<Local>) -> WeekInfo {
    let naive = now.naive_local();
    let iso = naive.date().iso_week();
    let bounds = week_bounds(now);

    WeekInfo {
        year: iso.year(),
        week_number: iso.week(),
        key: week_key(naive.date()),
        start: bounds.start,
        end: bounds.end,
    }
}

pub fn week_bounds(now: &DateTime<Local>) -> WeekBounds {
    let (start, end) = naive_bounds(now.naive_local());

    WeekBounds {
        start: localize(start),
        end: localize(end),
    }
}

pub fn next_week_start(now: &DateTime<Local>) -> DateTime<Local> {
    localize(naive_next_week_start(now.naive_local()))
}

/// Pins a wall-clock time to the local zone. Ambiguous times take the earlier
/// instant; times skipped by a DST jump move forward an hour.
pub fn localize(naive: NaiveDateTime) -> DateTime<Local> {
    localize_in(&Local, naive)
}

pub fn localize_in<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}
