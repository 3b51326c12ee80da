//! Monthly usage of the ephemerals of a cluster.
//!
//! Uptime is accounted per calendar month (UTC): an ephemeral created before
//! the first of the current month only contributes the time elapsed since
//! that first day, so the total resets every month.

use crate::domain::ephemeral::EphemeralResource;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use uom::si::f64::Time;
use uom::si::time::{hour, second};

/// 00:00:00 UTC on the first day of the month containing `now`.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let since_month_start = Duration::days(i64::from(now.day0()))
        + Duration::seconds(i64::from(now.num_seconds_from_midnight()))
        + Duration::nanoseconds(i64::from(now.nanosecond()));
    now - since_month_start
}

pub fn effective_start(
    creation_timestamp: DateTime<Utc>,
    month_start: DateTime<Utc>,
) -> DateTime<Utc> {
    creation_timestamp.max(month_start)
}

/// Never negative, a start after `now` counts for nothing.
fn elapsed(start: DateTime<Utc>, now: DateTime<Utc>) -> Time {
    let millis = (now - start).num_milliseconds().max(0);
    Time::new::<second>(millis as f64 / 1000.0)
}

/// Uptime of one ephemeral within the current month.
pub fn lifespan(resource: &EphemeralResource, now: DateTime<Utc>) -> Time {
    elapsed(
        effective_start(resource.creation_timestamp, month_start(now)),
        now,
    )
}

pub fn compute_total_hours(
    resources: &[EphemeralResource],
    now: DateTime<Utc>,
) -> Time {
    let month_start = month_start(now);
    resources
        .iter()
        .map(|resource| {
            elapsed(
                effective_start(resource.creation_timestamp, month_start),
                now,
            )
        })
        .fold(Time::new::<second>(0.0), |total, lifespan| total + lifespan)
}

/// Every listed ephemeral is live, whatever its status says.
pub fn compute_count(resources: &[EphemeralResource]) -> u64 {
    resources.len() as u64
}

/// Both aggregations computed over the same listing and the same `now`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageSnapshot {
    pub now:   DateTime<Utc>,
    pub total: Time,
    pub count: u64,
}

impl UsageSnapshot {
    pub fn compute(resources: &[EphemeralResource], now: DateTime<Utc>) -> Self {
        Self {
            now,
            total: compute_total_hours(resources, now),
            count: compute_count(resources),
        }
    }

    pub fn total_hours(&self) -> f64 { self.total.get::<hour>() }
}
