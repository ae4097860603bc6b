// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time sources and calendar bucketing.
//!
//! Records carry UTC timestamps. Day, hour and month boundaries are drawn
//! in one time zone per meter, chosen by [`TimeZonePolicy`].

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{
    DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike,
    Utc,
};
use halo_config::model::TimeZonePolicy;

/// Source of "now" for the meter.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used for replays and tests.
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicI64::new(start.timestamp_micros()),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.micros.store(at.timestamp_micros(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let step = by.num_microseconds().unwrap_or(i64::MAX);
        self.micros.fetch_add(step, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// Calendar arithmetic under a fixed time zone policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calendar {
    zone: TimeZonePolicy,
}

impl Calendar {
    pub fn new(zone: TimeZonePolicy) -> Self {
        Self { zone }
    }

    pub fn utc() -> Self {
        Self::new(TimeZonePolicy::Utc)
    }

    pub fn zone(&self) -> TimeZonePolicy {
        self.zone
    }

    fn local_naive(&self, ts: DateTime<Utc>) -> NaiveDateTime {
        match self.zone {
            TimeZonePolicy::Utc => ts.naive_utc(),
            TimeZonePolicy::Local => ts.with_timezone(&Local).naive_local(),
        }
    }

    /// Calendar date of `ts`.
    pub fn date_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        self.local_naive(ts).date()
    }

    /// Hour of day (0-23) of `ts`.
    pub fn hour_of(&self, ts: DateTime<Utc>) -> u32 {
        self.local_naive(ts).hour()
    }

    /// First instant of `date`.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(chrono::NaiveTime::MIN);
        match self.zone {
            TimeZonePolicy::Utc => midnight.and_utc(),
            TimeZonePolicy::Local => {
                // Days whose midnight falls in a DST gap start at the first
                // representable instant after it.
                (0..=2)
                    .find_map(|h| {
                        match Local.from_local_datetime(&(midnight + Duration::hours(h))) {
                            LocalResult::Single(t) => Some(t),
                            LocalResult::Ambiguous(earliest, _) => Some(earliest),
                            LocalResult::None => None,
                        }
                    })
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(|| midnight.and_utc())
            }
        }
    }

    /// Half-open `[start, end)` window covering `date`.
    pub fn day_window(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let next = date.succ_opt().unwrap_or(date);
        (self.start_of_day(date), self.start_of_day(next))
    }

    /// First instant of the calendar month containing `ts`.
    pub fn start_of_month(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let date = self.date_of(ts);
        let first = date.with_day(1).unwrap_or(date);
        self.start_of_day(first)
    }
}
