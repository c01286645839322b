//! Daily rollover: closing out the previous day and starting a fresh one.
//!
//! On every activation the engine compares today with the persisted
//! `lastOpenedDate`. When a day boundary has been crossed it
//!
//! 1. snapshots the stale day at the live completion percentage,
//! 2. backfills a 0% snapshot for every day the app was never opened,
//! 3. resets all habits to incomplete,
//! 4. and only then advances `lastOpenedDate` to today.
//!
//! Progress through these steps is a [`RolloverStage`]. The stage is not
//! stored; it is re-derived from the history rows already present for the
//! days being closed, so a run that failed half way resumes where it left
//! off without writing a second row for any day.
//!
//! A rollover holds the habit-set lock for its entire duration, so habit
//! mutations issued meanwhile wait and apply to the new day. Overlapping
//! checks for the same owner are collapsed into one by a [`SingleFlight`].

use std::{sync::Arc, time::Duration};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
  OwnerId, RolloverError,
  day::{Clock, days_between},
  habit_set::HabitSet,
  history::HistoryRange,
  recorder::HistoryRecorder,
  settings::{LAST_OPENED_DATE_KEY, LocalSettings},
  single_flight::SingleFlight,
  store::HabitStore,
};

// ─── Progress ────────────────────────────────────────────────────────────────

/// How far a rollover has progressed. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloverStage {
  NotStarted,
  SnapshottedCurrentDay,
  BackfilledMissingDays,
  HabitsReset,
  /// `lastOpenedDate` advanced; the only stage visible outside a failure.
  Committed,
}

/// What a completed rollover did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloverReport {
  /// The day that was closed out (the previous `lastOpenedDate`).
  pub stale_day:        NaiveDate,
  pub today:            NaiveDate,
  /// Completion of the stale day at the moment it was closed.
  pub stale_percentage: f64,
  /// Days for which a snapshot was written by this run.
  pub written:          Vec<NaiveDate>,
  /// Days that already had a snapshot from an earlier, interrupted run.
  pub skipped:          Vec<NaiveDate>,
  pub habits_reset:     usize,
  pub stage:            RolloverStage,
}

/// The decision taken by a rollover check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RolloverOutcome {
  /// No `lastOpenedDate` was stored; it is now today.
  FirstRun { today: NaiveDate },
  /// Already rolled over today.
  SameDay { today: NaiveDate },
  /// The clock reads earlier than `lastOpenedDate`. Nothing was done and the
  /// stored date was left in place.
  ClockBehind { today: NaiveDate, last_opened: NaiveDate },
  RolledOver(RolloverReport),
}

impl RolloverOutcome {
  pub fn rolled_over(&self) -> bool { matches!(self, Self::RolledOver(_)) }
}

pub type RolloverResult = Result<RolloverOutcome, RolloverError>;

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct RolloverEngine<S, L, C> {
  settings: Arc<L>,
  clock:    Arc<C>,
  recorder: HistoryRecorder<S>,
  habits:   Arc<Mutex<HabitSet<S>>>,
  flights:  SingleFlight<OwnerId, RolloverResult>,
}

impl<S, L, C> RolloverEngine<S, L, C>
where
  S: HabitStore,
  L: LocalSettings,
  C: Clock,
{
  /// Build an engine that rolls over `habits`. The same `habits` handle must
  /// be used for every other mutation of the set so they serialise against
  /// the rollover.
  pub fn new(
    store: Arc<S>,
    settings: Arc<L>,
    clock: Arc<C>,
    habits: Arc<Mutex<HabitSet<S>>>,
    timeout: Duration,
  ) -> Self {
    Self {
      settings,
      clock,
      recorder: HistoryRecorder::new(store, timeout),
      habits,
      flights: SingleFlight::new(),
    }
  }

  /// Run the rollover check for `owner_id`.
  ///
  /// Safe to call redundantly: a concurrent call for the same owner joins
  /// the one in flight, and a call after a completed rollover finds
  /// `lastOpenedDate == today` and writes nothing.
  pub async fn run_rollover_check(&self, owner_id: OwnerId) -> RolloverResult {
    self.flights.run(owner_id, || self.check(owner_id)).await
  }

  async fn check(&self, owner_id: OwnerId) -> RolloverResult {
    let mut habits = self.habits.lock().await;
    habits.switch_owner(owner_id);

    let today = self.clock.today();
    let stored = self
      .settings
      .get_date(LAST_OPENED_DATE_KEY)
      .await
      .map_err(RolloverError::settings)?;

    let Some(last_opened) = stored else {
      info!(%today, "first activation; recording today as last opened");
      self.commit(today).await?;
      return Ok(RolloverOutcome::FirstRun { today });
    };

    if today == last_opened {
      debug!(%today, "no day boundary crossed");
      self.commit(today).await?;
      return Ok(RolloverOutcome::SameDay { today });
    }

    if today < last_opened {
      warn!(%today, %last_opened, "clock is behind the last opened day; skipping rollover");
      return Ok(RolloverOutcome::ClockBehind { today, last_opened });
    }

    info!(%owner_id, from = %last_opened, to = %today, "new day detected; rolling over");
    let mut report = self.roll_forward(&mut habits, owner_id, last_opened, today).await?;

    self.commit(today).await?;
    report.stage = RolloverStage::Committed;
    info!(
      written = report.written.len(),
      skipped = report.skipped.len(),
      habits_reset = report.habits_reset,
      "rollover committed"
    );
    Ok(RolloverOutcome::RolledOver(report))
  }

  /// Steps 1–3. Leaves `lastOpenedDate` untouched.
  async fn roll_forward(
    &self,
    habits: &mut HabitSet<S>,
    owner_id: OwnerId,
    stale_day: NaiveDate,
    today: NaiveDate,
  ) -> Result<RolloverReport, RolloverError> {
    let mut report = RolloverReport {
      stale_day,
      today,
      stale_percentage: 0.0,
      written: Vec::new(),
      skipped: Vec::new(),
      habits_reset: 0,
      stage: RolloverStage::NotStarted,
    };

    // Days closed by this rollover that already have a row were written by
    // an earlier attempt; they are the persisted part of the stage.
    let recorded = self
      .recorder
      .recorded_days(owner_id, HistoryRange::new(stale_day, today))
      .await?;

    habits.refresh().await?;
    report.stale_percentage = habits.completion_percentage();

    if recorded.contains(&stale_day) {
      debug!(%stale_day, "stale day already snapshotted");
      report.skipped.push(stale_day);
    } else {
      self
        .recorder
        .record_snapshot(owner_id, stale_day, report.stale_percentage)
        .await?;
      report.written.push(stale_day);
    }
    report.stage = RolloverStage::SnapshottedCurrentDay;

    let missed: Vec<NaiveDate> = days_between(stale_day, today).collect();
    for (i, &day) in missed.iter().enumerate() {
      if recorded.contains(&day) {
        report.skipped.push(day);
        continue;
      }
      if let Err(source) = self.recorder.record_snapshot(owner_id, day, 0.0).await {
        warn!(%day, error = %source, stage = ?report.stage, "backfill interrupted");
        if report.written.is_empty() {
          return Err(source.into());
        }
        return Err(RolloverError::Partial {
          stale_day,
          written: report.written,
          pending: missed[i..].iter().copied().filter(|d| !recorded.contains(d)).collect(),
          source,
        });
      }
      report.written.push(day);
    }
    report.stage = RolloverStage::BackfilledMissingDays;

    report.habits_reset = habits.reset_all().await.inspect_err(|e| {
      warn!(error = %e, "habit reset interrupted");
    })?;
    report.stage = RolloverStage::HabitsReset;

    Ok(report)
  }

  async fn commit(&self, today: NaiveDate) -> Result<(), RolloverError> {
    self
      .settings
      .set_date(LAST_OPENED_DATE_KEY, today)
      .await
      .map_err(RolloverError::settings)
  }
}
