//! Completion history: one percentage snapshot per owner per calendar day.
//!
//! Rows are append-only. Nothing at the store level prevents two rows for
//! the same `(owner_id, date)`; readers collapse duplicates with [`by_day`]
//! and the rollover engine avoids writing them in the first place.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{OwnerId, day};

// ─── Records ─────────────────────────────────────────────────────────────────

/// A persisted snapshot of one day's completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionHistory {
  pub id:                    Uuid,
  pub owner_id:              OwnerId,
  pub date:                  NaiveDate,
  /// Fraction of habits completed that day, in `[0, 1]`.
  pub completion_percentage: f64,
  pub created_at:            DateTime<Utc>,
}

impl CompletionHistory {
  pub fn band(&self) -> CompletionBand {
    CompletionBand::from_percentage(self.completion_percentage)
  }
}

/// Input for a new snapshot. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSnapshot {
  pub owner_id:              OwnerId,
  pub date:                  NaiveDate,
  pub completion_percentage: f64,
}

impl NewSnapshot {
  /// The percentage is clamped into `[0, 1]`; NaN is recorded as 0.
  pub fn new(owner_id: OwnerId, date: NaiveDate, percentage: f64) -> Self {
    Self {
      owner_id,
      date,
      completion_percentage: clamp_percentage(percentage),
    }
  }
}

pub fn clamp_percentage(p: f64) -> f64 {
  if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

// ─── Ranges ──────────────────────────────────────────────────────────────────

/// A half-open range of calendar days: `start <= date < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRange {
  pub start: NaiveDate,
  pub end:   NaiveDate,
}

impl HistoryRange {
  pub fn new(start: NaiveDate, end: NaiveDate) -> Self { Self { start, end } }

  /// The single day `day`.
  pub fn day(day: NaiveDate) -> Self {
    Self { start: day, end: day.succ_opt().unwrap_or(NaiveDate::MAX) }
  }

  /// The calendar month containing `day`.
  pub fn month_of(day: NaiveDate) -> Self {
    Self { start: day::month_start(day), end: day::next_month_start(day) }
  }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start <= date && date < self.end
  }

  pub fn is_empty(&self) -> bool { self.start >= self.end }
}

// ─── Calendar shading ────────────────────────────────────────────────────────

/// Intensity bucket used when rendering a day on the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionBand {
  Empty,
  Low,
  Medium,
  High,
}

impl CompletionBand {
  pub fn from_percentage(p: f64) -> Self {
    match clamp_percentage(p) {
      p if p == 0.0 => Self::Empty,
      p if p < 0.5 => Self::Low,
      p if p < 0.8 => Self::Medium,
      _ => Self::High,
    }
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Sort rows by day, oldest first; same-day rows by creation time.
pub fn sort_by_date(rows: &mut [CompletionHistory]) {
  rows.sort_by(|a, b| {
    a.date
      .cmp(&b.date)
      .then_with(|| a.created_at.cmp(&b.created_at))
  });
}

/// Collapse rows to one percentage per day. The earliest-created row for a
/// day wins, so a stray duplicate never overrides the original snapshot.
pub fn by_day(rows: &[CompletionHistory]) -> BTreeMap<NaiveDate, f64> {
  let mut sorted = rows.to_vec();
  sort_by_date(&mut sorted);

  let mut days = BTreeMap::new();
  for row in sorted {
    days.entry(row.date).or_insert(row.completion_percentage);
  }
  days
}
