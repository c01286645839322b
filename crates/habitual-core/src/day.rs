//! Calendar days and the clock that defines them.
//!
//! A calendar day is a [`NaiveDate`]: the local date with the time of day
//! truncated. All day arithmetic in the crate goes through this module.

use std::sync::Mutex;

use chrono::{DateTime, Datelike as _, Local, NaiveDate, Utc};

/// Source of "now" and of the current calendar day.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;

  /// The current calendar day in the clock's reference time zone.
  fn today(&self) -> NaiveDate;
}

/// Wall clock; days are truncated in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }

  fn today(&self) -> NaiveDate { Local::now().date_naive() }
}

/// A clock that only moves when told to. Days are taken in UTC.
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(now: DateTime<Utc>) -> Self { Self { now: Mutex::new(now) } }

  /// A clock set to noon UTC on `day`.
  pub fn at_day(day: NaiveDate) -> Self {
    let noon = day.and_hms_opt(12, 0, 0).unwrap_or_default().and_utc();
    Self::new(noon)
  }

  pub fn set(&self, now: DateTime<Utc>) {
    *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
  }

  pub fn advance_days(&self, days: i64) {
    let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
    *now += chrono::Duration::days(days);
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn today(&self) -> NaiveDate { self.now().date_naive() }
}

/// Days strictly between `after` and `before`, ascending.
///
/// Empty when the two days are adjacent, equal, or out of order.
pub fn days_between(
  after: NaiveDate,
  before: NaiveDate,
) -> impl Iterator<Item = NaiveDate> {
  after.iter_days().skip(1).take_while(move |d| *d < before)
}

/// First day of the month containing `day`.
pub fn month_start(day: NaiveDate) -> NaiveDate {
  day.with_day0(0).unwrap_or(day)
}

/// First day of the month after the one containing `day`.
pub fn next_month_start(day: NaiveDate) -> NaiveDate {
  let start = month_start(day);
  start
    .checked_add_months(chrono::Months::new(1))
    .unwrap_or(NaiveDate::MAX)
}
