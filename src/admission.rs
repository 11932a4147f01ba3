//! # Admission Control
//!
//! One prescription per week. Only the latest record matters: if it was
//! created in the current week the request is denied, otherwise allowed.
use chrono::{DateTime, Local, TimeDelta, Utc};
use serde::Serialize;

use crate::{
    models::PrescriptionHistory,
    week::{WeekBounds, current_week, next_week_start, week_bounds},
};

pub const REASON_FIRST: &str = "first";
pub const REASON_NEW_WEEK: &str = "new week";
pub const REASON_ALREADY_CREATED: &str = "already created this week";

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    pub allowed: bool,
    pub reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_prescription_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_available_date: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_week: Option<WeekBounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_until_next: Option<TimeUntil>,
}

impl Admission {
    fn allowed(reason: &'static str) -> Self {
        Self {
            allowed: true,
            reason,
            last_prescription_date: None,
            next_available_date: None,
            current_week: None,
            time_until_next: None,
        }
    }
}

/// Signed breakdown of the time left until next Monday 00:00. Components
/// share the sign of the total and are negative once the moment has passed.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUntil {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    #[serde(skip)]
    remaining: TimeDelta,
}

impl TimeUntil {
    /// True once the target is reached, to the millisecond. The minute
    /// components alone read zero for the last 59 seconds.
    pub fn is_elapsed(&self) -> bool {
        self.remaining <= TimeDelta::zero()
    }

    pub fn parts(&self) -> (i64, i64, i64) {
        (self.days, self.hours, self.minutes)
    }
}

pub fn check_admission(history: &PrescriptionHistory, now: &DateTime<Local>) -> Admission {
    let Some(last) = history.last() else {
        return Admission::allowed(REASON_FIRST);
    };

    if last.week_key != current_week(now).key {
        return Admission::allowed(REASON_NEW_WEEK);
    }

    Admission {
        allowed: false,
        reason: REASON_ALREADY_CREATED,
        last_prescription_date: Some(last.timestamp),
        next_available_date: Some(next_week_start(now)),
        current_week: Some(week_bounds(now)),
        time_until_next: Some(time_until_next(now)),
    }
}

pub fn time_until_next(now: &DateTime<Local>) -> TimeUntil {
    time_until(now, &next_week_start(now))
}

pub fn time_until(now: &DateTime<Local>, target: &DateTime<Local>) -> TimeUntil {
    let delta = target.signed_duration_since(*now);

    TimeUntil {
        days: delta.num_days(),
        hours: delta.num_hours() % 24,
        minutes: delta.num_minutes() % 60,
        remaining: delta,
    }
}
