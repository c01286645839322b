//! `HistoryRecorder`: writes daily completion snapshots and reads them back
//! for calendar rendering.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use chrono::NaiveDate;
use tracing::debug;

use crate::{
  OwnerId, StoreError,
  history::{self, CompletionHistory, HistoryRange, NewSnapshot},
  store::{HabitStore, bounded},
};

pub struct HistoryRecorder<S> {
  store:   Arc<S>,
  timeout: Duration,
}

impl<S> Clone for HistoryRecorder<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), timeout: self.timeout }
  }
}

impl<S: HabitStore> HistoryRecorder<S> {
  pub fn new(store: Arc<S>, timeout: Duration) -> Self { Self { store, timeout } }

  /// Append a snapshot for `date`.
  ///
  /// No check is made for an existing row on the same day; callers must
  /// make sure each day is recorded at most once.
  pub async fn record_snapshot(
    &self,
    owner_id: OwnerId,
    date: NaiveDate,
    percentage: f64,
  ) -> Result<CompletionHistory, StoreError> {
    let input = NewSnapshot::new(owner_id, date, percentage);
    debug!(%owner_id, %date, percentage = input.completion_percentage, "recording snapshot");
    bounded(self.timeout, self.store.insert_history(input)).await
  }

  /// Rows with `range.start <= date < range.end`, oldest day first.
  pub async fn query_range(
    &self,
    owner_id: OwnerId,
    range: HistoryRange,
  ) -> Result<Vec<CompletionHistory>, StoreError> {
    if range.is_empty() {
      return Ok(Vec::new());
    }
    let mut rows =
      bounded(self.timeout, self.store.list_history(owner_id, Some(range))).await?;
    rows.retain(|r| r.owner_id == owner_id && range.contains(r.date));
    history::sort_by_date(&mut rows);
    Ok(rows)
  }

  /// Rows for the calendar month containing `day`.
  pub async fn query_month(
    &self,
    owner_id: OwnerId,
    day: NaiveDate,
  ) -> Result<Vec<CompletionHistory>, StoreError> {
    self.query_range(owner_id, HistoryRange::month_of(day)).await
  }

  /// The original (earliest) snapshot for one day, if any.
  pub async fn snapshot_for(
    &self,
    owner_id: OwnerId,
    day: NaiveDate,
  ) -> Result<Option<CompletionHistory>, StoreError> {
    let rows = self.query_range(owner_id, HistoryRange::day(day)).await?;
    Ok(rows.into_iter().next())
  }

  /// The set of days in `range` that already have at least one row.
  pub async fn recorded_days(
    &self,
    owner_id: OwnerId,
    range: HistoryRange,
  ) -> Result<BTreeSet<NaiveDate>, StoreError> {
    let rows = self.query_range(owner_id, range).await?;
    Ok(rows.into_iter().map(|r| r.date).collect())
  }
}
