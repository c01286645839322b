//! Rollover, habit-set, and tracker tests against in-memory collaborators.

use std::{
  collections::HashSet,
  sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use chrono::{NaiveDate, TimeDelta, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::{
  AuthError, Error, OwnerId, RolloverError, StoreError,
  config::TrackerConfig,
  day::ManualClock,
  habit::{Habit, HabitPatch, NewHabit},
  habit_set::{Progress, completed_count, completion_percentage},
  history::{CompletionHistory, HistoryRange, NewSnapshot},
  rollover::{RolloverOutcome, RolloverStage},
  session::SessionProvider,
  settings::{LAST_OPENED_DATE_KEY, MemorySettings},
  store::{HabitStore, bounded},
  tracker::Tracker,
};

// ─── Fakes ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("injected store failure")]
struct Injected;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> { m.lock().unwrap() }

#[derive(Default)]
struct FakeStore {
  habits:            Mutex<Vec<Habit>>,
  history:           Mutex<Vec<CompletionHistory>>,
  failing_days:      Mutex<HashSet<NaiveDate>>,
  fail_updates:      AtomicBool,
  habit_writes:      AtomicUsize,
  history_writes:    AtomicUsize,
  /// When set, the next `update_habit` call parks until released.
  pause_next_update: AtomicBool,
  update_entered:    Notify,
  update_release:    Notify,
}

impl FakeStore {
  fn seed(&self, owner_id: OwnerId, habits: &[(&str, bool)]) -> Vec<Habit> {
    let base = Utc::now();
    let seeded: Vec<Habit> = habits
      .iter()
      .enumerate()
      .map(|(i, (title, done))| Habit {
        id:           Uuid::new_v4(),
        owner_id,
        title:        (*title).to_owned(),
        is_completed: *done,
        created_at:   base + TimeDelta::milliseconds(i as i64),
      })
      .collect();
    lock(&self.habits).extend(seeded.iter().cloned());
    seeded
  }

  fn habits_for(&self, owner_id: OwnerId) -> Vec<Habit> {
    let mut habits: Vec<_> = lock(&self.habits)
      .iter()
      .filter(|h| h.owner_id == owner_id)
      .cloned()
      .collect();
    habits.sort_by_key(|h| h.created_at);
    habits
  }

  fn history_for(&self, owner_id: OwnerId) -> Vec<(NaiveDate, f64)> {
    let mut rows: Vec<_> = lock(&self.history)
      .iter()
      .filter(|r| r.owner_id == owner_id)
      .map(|r| (r.date, r.completion_percentage))
      .collect();
    rows.sort_by_key(|(d, _)| *d);
    rows
  }

  fn writes(&self) -> usize {
    self.habit_writes.load(Ordering::SeqCst) + self.history_writes.load(Ordering::SeqCst)
  }

  fn fail_history_on(&self, day: NaiveDate) { lock(&self.failing_days).insert(day); }

  fn heal(&self) {
    lock(&self.failing_days).clear();
    self.fail_updates.store(false, Ordering::SeqCst);
  }
}

impl HabitStore for FakeStore {
  type Error = Injected;

  async fn list_habits(&self, owner_id: OwnerId) -> Result<Vec<Habit>, Injected> {
    // Reverse to prove callers do not rely on store ordering.
    let mut habits = self.habits_for(owner_id);
    habits.reverse();
    Ok(habits)
  }

  async fn insert_habit(&self, input: NewHabit) -> Result<Habit, Injected> {
    let habit = Habit {
      id:           Uuid::new_v4(),
      owner_id:     input.owner_id,
      title:        input.title,
      is_completed: false,
      created_at:   Utc::now(),
    };
    self.habit_writes.fetch_add(1, Ordering::SeqCst);
    lock(&self.habits).push(habit.clone());
    Ok(habit)
  }

  async fn update_habit(
    &self,
    owner_id: OwnerId,
    id: Uuid,
    patch: HabitPatch,
  ) -> Result<Option<Habit>, Injected> {
    if self.pause_next_update.swap(false, Ordering::SeqCst) {
      self.update_entered.notify_one();
      self.update_release.notified().await;
    }
    if self.fail_updates.load(Ordering::SeqCst) {
      return Err(Injected);
    }
    self.habit_writes.fetch_add(1, Ordering::SeqCst);
    let mut habits = lock(&self.habits);
    Ok(
      habits
        .iter_mut()
        .find(|h| h.id == id && h.owner_id == owner_id)
        .map(|h| {
          patch.apply(h);
          h.clone()
        }),
    )
  }

  async fn delete_habit(&self, owner_id: OwnerId, id: Uuid) -> Result<bool, Injected> {
    let mut habits = lock(&self.habits);
    let before = habits.len();
    habits.retain(|h| !(h.id == id && h.owner_id == owner_id));
    Ok(habits.len() != before)
  }

  async fn list_history(
    &self,
    owner_id: OwnerId,
    range: Option<HistoryRange>,
  ) -> Result<Vec<CompletionHistory>, Injected> {
    let mut rows: Vec<_> = lock(&self.history)
      .iter()
      .filter(|r| r.owner_id == owner_id)
      .filter(|r| range.is_none_or(|range| range.contains(r.date)))
      .cloned()
      .collect();
    rows.reverse();
    Ok(rows)
  }

  async fn insert_history(&self, input: NewSnapshot) -> Result<CompletionHistory, Injected> {
    if lock(&self.failing_days).contains(&input.date) {
      return Err(Injected);
    }
    let row = CompletionHistory {
      id:                    Uuid::new_v4(),
      owner_id:              input.owner_id,
      date:                  input.date,
      completion_percentage: input.completion_percentage,
      created_at:            Utc::now(),
    };
    self.history_writes.fetch_add(1, Ordering::SeqCst);
    lock(&self.history).push(row.clone());
    Ok(row)
  }
}

#[derive(Default)]
struct FakeSession {
  owner:     Option<OwnerId>,
  expired:   AtomicBool,
  refreshes: AtomicUsize,
}

impl SessionProvider for FakeSession {
  async fn current_user_id(&self) -> Result<Option<OwnerId>, AuthError> {
    if self.expired.load(Ordering::SeqCst) {
      return Err(AuthError::Expired { at: Utc::now() });
    }
    Ok(self.owner)
  }

  async fn refresh_session(&self) -> Result<(), AuthError> {
    self.refreshes.fetch_add(1, Ordering::SeqCst);
    self.expired.store(false, Ordering::SeqCst);
    Ok(())
  }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

type TestTracker = Tracker<FakeStore, FakeSession, MemorySettings, ManualClock>;

struct Harness {
  owner:    OwnerId,
  store:    Arc<FakeStore>,
  session:  Arc<FakeSession>,
  settings: Arc<MemorySettings>,
  tracker:  Arc<TestTracker>,
}

impl Harness {
  fn new(last_opened: Option<NaiveDate>, today: NaiveDate) -> Self {
    let owner = Uuid::new_v4();
    Self::with_session(
      FakeSession { owner: Some(owner), ..Default::default() },
      owner,
      last_opened,
      today,
    )
  }

  fn with_session(
    session: FakeSession,
    owner: OwnerId,
    last_opened: Option<NaiveDate>,
    today: NaiveDate,
  ) -> Self {
    let store = Arc::new(FakeStore::default());
    let session = Arc::new(session);
    let settings = Arc::new(match last_opened {
      Some(day) => MemorySettings::last_opened(day),
      None => MemorySettings::new(),
    });
    let clock = Arc::new(ManualClock::at_day(today));
    let tracker = Arc::new(Tracker::new(
      store.clone(),
      session.clone(),
      settings.clone(),
      clock,
      &TrackerConfig::default(),
    ));
    Self { owner, store, session, settings, tracker }
  }

  fn stored_date(&self) -> Option<NaiveDate> { self.settings.peek(LAST_OPENED_DATE_KEY) }
}

fn day(n: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + TimeDelta::days(n.into()) }

fn report(outcome: RolloverOutcome) -> crate::rollover::RolloverReport {
  match outcome {
    RolloverOutcome::RolledOver(report) => report,
    other => panic!("expected a rollover, got {other:?}"),
  }
}

// ─── Metrics ─────────────────────────────────────────────────────────────────

fn habits_with(done: &[bool]) -> Vec<Habit> {
  done
    .iter()
    .map(|d| Habit {
      id:           Uuid::new_v4(),
      owner_id:     Uuid::nil(),
      title:        "h".into(),
      is_completed: *d,
      created_at:   Utc::now(),
    })
    .collect()
}

#[test]
fn empty_set_has_zero_percentage() {
  assert_eq!(completion_percentage(&[]), 0.0);
  let progress = Progress::of(&[]);
  assert_eq!((progress.completed, progress.total), (0, 0));
  assert_eq!(progress.percentage, 0.0);
}

#[test]
fn percentage_is_completed_over_total_for_every_pattern() {
  for total in 1..=6usize {
    for mask in 0..(1u32 << total) {
      let done: Vec<bool> = (0..total).map(|i| mask & (1 << i) != 0).collect();
      let habits = habits_with(&done);
      let completed = done.iter().filter(|d| **d).count();
      assert_eq!(completed_count(&habits), completed);
      let expected = completed as f64 / total as f64;
      assert!((completion_percentage(&habits) - expected).abs() < 1e-12);
    }
  }
}

// ─── Rollover decisions ──────────────────────────────────────────────────────

#[tokio::test]
async fn first_run_records_today_and_writes_nothing() {
  let h = Harness::new(None, day(0));
  h.store.seed(h.owner, &[("Run", true)]);

  let outcome = h.tracker.activate().await.unwrap();

  assert_eq!(outcome, RolloverOutcome::FirstRun { today: day(0) });
  assert_eq!(h.stored_date(), Some(day(0)));
  assert_eq!(h.store.writes(), 0);
  assert!(h.store.habits_for(h.owner)[0].is_completed);
}

#[tokio::test]
async fn same_day_performs_no_snapshot_or_reset() {
  let h = Harness::new(Some(day(0)), day(0));
  h.store.seed(h.owner, &[("Run", true), ("Read", false)]);

  let outcome = h.tracker.activate().await.unwrap();

  assert_eq!(outcome, RolloverOutcome::SameDay { today: day(0) });
  assert_eq!(h.stored_date(), Some(day(0)));
  assert_eq!(h.store.writes(), 0);
  assert!(h.store.history_for(h.owner).is_empty());
}

#[tokio::test]
async fn one_elapsed_day_snapshots_live_percentage_and_resets() {
  let h = Harness::new(Some(day(0)), day(1));
  h.store.seed(
    h.owner,
    &[("a", true), ("b", false), ("c", true), ("d", false), ("e", false)],
  );

  let report = report(h.tracker.activate().await.unwrap());

  assert_eq!(h.store.history_for(h.owner), vec![(day(0), 0.4)]);
  assert_eq!(report.stale_percentage, 0.4);
  assert_eq!(report.written, vec![day(0)]);
  assert!(report.skipped.is_empty());
  assert_eq!(report.habits_reset, 2);
  assert_eq!(report.stage, RolloverStage::Committed);
  assert!(h.store.habits_for(h.owner).iter().all(|h| !h.is_completed));
  assert_eq!(h.stored_date(), Some(day(1)));

  let progress = h.tracker.progress().await.unwrap();
  assert_eq!((progress.completed, progress.total), (0, 5));
}

#[tokio::test]
async fn three_elapsed_days_backfill_the_gap_at_zero() {
  let h = Harness::new(Some(day(0)), day(3));
  h.store.seed(h.owner, &[("a", true), ("b", true), ("c", true), ("d", false)]);

  let report = report(h.tracker.activate().await.unwrap());

  assert_eq!(
    h.store.history_for(h.owner),
    vec![(day(0), 0.75), (day(1), 0.0), (day(2), 0.0)]
  );
  assert_eq!(report.written, vec![day(0), day(1), day(2)]);
  assert!(h.store.habits_for(h.owner).iter().all(|h| !h.is_completed));
  assert_eq!(h.stored_date(), Some(day(3)));
}

#[tokio::test]
async fn week_away_writes_one_row_per_missed_day() {
  let h = Harness::new(Some(day(0)), day(8));
  h.store.seed(h.owner, &[("a", false)]);

  h.tracker.activate().await.unwrap();

  let rows = h.store.history_for(h.owner);
  assert_eq!(rows.len(), 8);
  assert_eq!(rows.first(), Some(&(day(0), 0.0)));
  assert_eq!(rows.last(), Some(&(day(7), 0.0)));
}

#[tokio::test]
async fn second_check_right_after_rollover_writes_nothing() {
  let h = Harness::new(Some(day(0)), day(2));
  h.store.seed(h.owner, &[("a", true), ("b", false)]);

  assert!(h.tracker.activate().await.unwrap().rolled_over());
  let writes = h.store.writes();

  let again = h.tracker.activate().await.unwrap();
  assert_eq!(again, RolloverOutcome::SameDay { today: day(2) });
  assert_eq!(h.store.writes(), writes);
  assert_eq!(h.store.history_for(h.owner).len(), 2);
}

#[tokio::test]
async fn clock_moved_backward_keeps_stored_date() {
  let h = Harness::new(Some(day(5)), day(3));
  h.store.seed(h.owner, &[("a", true)]);

  let outcome = h.tracker.activate().await.unwrap();

  assert_eq!(
    outcome,
    RolloverOutcome::ClockBehind { today: day(3), last_opened: day(5) }
  );
  assert_eq!(h.stored_date(), Some(day(5)));
  assert_eq!(h.store.writes(), 0);
}

// ─── Failure and retry ───────────────────────────────────────────────────────

#[tokio::test]
async fn failed_stale_snapshot_does_not_advance_pointer() {
  let h = Harness::new(Some(day(0)), day(1));
  h.store.seed(h.owner, &[("a", true)]);
  h.store.fail_history_on(day(0));

  let err = h.tracker.activate().await.unwrap_err();

  assert!(matches!(err, Error::Rollover(RolloverError::Store(_))), "{err:?}");
  assert_eq!(h.stored_date(), Some(day(0)));
  assert!(h.store.habits_for(h.owner)[0].is_completed);
}

#[tokio::test]
async fn partial_backfill_resumes_without_duplicates() {
  let h = Harness::new(Some(day(0)), day(4));
  h.store.seed(h.owner, &[("a", true), ("b", false)]);
  h.store.fail_history_on(day(2));

  let err = h.tracker.activate().await.unwrap_err();
  match err {
    Error::Rollover(RolloverError::Partial { stale_day, written, pending, .. }) => {
      assert_eq!(stale_day, day(0));
      assert_eq!(written, vec![day(0), day(1)]);
      assert_eq!(pending, vec![day(2), day(3)]);
    }
    other => panic!("expected partial rollover, got {other:?}"),
  }
  assert_eq!(h.stored_date(), Some(day(0)));
  assert!(h.store.habits_for(h.owner)[0].is_completed, "reset must not run");

  h.store.heal();
  let report = report(h.tracker.activate().await.unwrap());

  assert_eq!(report.written, vec![day(2), day(3)]);
  assert_eq!(report.skipped, vec![day(0), day(1)]);
  assert_eq!(
    h.store.history_for(h.owner),
    vec![(day(0), 0.5), (day(1), 0.0), (day(2), 0.0), (day(3), 0.0)]
  );
  assert_eq!(h.stored_date(), Some(day(4)));
  assert!(h.store.habits_for(h.owner).iter().all(|h| !h.is_completed));
}

#[tokio::test]
async fn failed_reset_is_retried_on_next_activation() {
  let h = Harness::new(Some(day(0)), day(1));
  h.store.seed(h.owner, &[("a", true), ("b", true)]);
  h.store.fail_updates.store(true, Ordering::SeqCst);

  let err = h.tracker.activate().await.unwrap_err();
  assert!(matches!(err, Error::Rollover(RolloverError::Store(_))), "{err:?}");
  assert_eq!(h.stored_date(), Some(day(0)));
  assert_eq!(h.store.history_for(h.owner), vec![(day(0), 1.0)]);

  h.store.heal();
  let report = report(h.tracker.activate().await.unwrap());

  assert!(report.written.is_empty());
  assert_eq!(report.skipped, vec![day(0)]);
  assert_eq!(report.habits_reset, 2);
  assert_eq!(h.store.history_for(h.owner), vec![(day(0), 1.0)]);
  assert_eq!(h.stored_date(), Some(day(1)));
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn toggle_during_reset_is_applied_after_the_reset() {
  let h = Harness::new(Some(day(0)), day(1));
  let habits = h.store.seed(h.owner, &[("Run", true), ("Read", false)]);
  h.store.pause_next_update.store(true, Ordering::SeqCst);

  let rollover = {
    let tracker = h.tracker.clone();
    tokio::spawn(async move { tracker.activate().await })
  };
  // The reset is now parked inside its first store update.
  h.store.update_entered.notified().await;

  let toggle = {
    let tracker = h.tracker.clone();
    let id = habits[1].id;
    tokio::spawn(async move { tracker.toggle(id).await })
  };
  tokio::time::sleep(Duration::from_millis(20)).await;
  assert!(!toggle.is_finished(), "toggle must wait for the rollover");

  h.store.update_release.notify_one();

  assert!(rollover.await.unwrap().unwrap().rolled_over());
  assert!(toggle.await.unwrap().unwrap());

  let stored = h.store.habits_for(h.owner);
  assert!(!stored[0].is_completed, "reset applies to the old day's habit");
  assert!(stored[1].is_completed, "toggle survives the reset");
  assert_eq!(h.store.history_for(h.owner), vec![(day(0), 0.5)]);

  let progress = h.tracker.progress().await.unwrap();
  assert_eq!((progress.completed, progress.total), (1, 2));
}

#[tokio::test]
async fn overlapping_activations_run_one_rollover() {
  let h = Harness::new(Some(day(0)), day(2));
  h.store.seed(h.owner, &[("a", true)]);
  h.store.pause_next_update.store(true, Ordering::SeqCst);

  let first = {
    let tracker = h.tracker.clone();
    tokio::spawn(async move { tracker.activate().await })
  };
  h.store.update_entered.notified().await;

  let second = {
    let tracker = h.tracker.clone();
    tokio::spawn(async move { tracker.activate().await })
  };
  tokio::time::sleep(Duration::from_millis(20)).await;
  h.store.update_release.notify_one();

  let a = first.await.unwrap().unwrap();
  let b = second.await.unwrap().unwrap();
  assert!(a.rolled_over());
  assert_eq!(a, b, "joined call sees the leader's outcome");
  assert_eq!(h.store.history_for(h.owner), vec![(day(0), 1.0), (day(1), 0.0)]);
  assert_eq!(h.stored_date(), Some(day(2)));
}

// ─── Timeouts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn slow_store_call_becomes_timeout_error() {
  let limit = Duration::from_millis(10);
  let slow = async {
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok::<_, Injected>(())
  };
  assert!(matches!(bounded(limit, slow).await, Err(StoreError::Timeout(d)) if d == limit));
}

#[tokio::test]
async fn backend_error_is_wrapped() {
  let failing = async { Err::<(), _>(Injected) };
  let err = bounded(Duration::from_secs(1), failing).await.unwrap_err();
  assert!(matches!(err, StoreError::Backend(_)));
  assert!(err.to_string().contains("injected"));
}

// ─── Tracker ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn activation_without_session_is_an_auth_error() {
  let h = Harness::with_session(FakeSession::default(), Uuid::new_v4(), None, day(0));
  let err = h.tracker.activate().await.unwrap_err();
  assert!(matches!(err, Error::Auth(AuthError::NoSession)));
  assert_eq!(h.stored_date(), None);
}

#[tokio::test]
async fn expired_session_is_refreshed_once() {
  let owner = Uuid::new_v4();
  let session = FakeSession { owner: Some(owner), ..Default::default() };
  session.expired.store(true, Ordering::SeqCst);
  let h = Harness::with_session(session, owner, Some(day(0)), day(0));

  assert_eq!(h.tracker.owner().await.unwrap(), owner);
  assert_eq!(h.session.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn habit_mutations_write_through() {
  let h = Harness::new(Some(day(0)), day(0));
  h.tracker.activate().await.unwrap();

  let created = h.tracker.create_habit("  Stretch ").await.unwrap();
  assert_eq!(created.title, "Stretch");
  assert_eq!(h.tracker.habits().await.unwrap().len(), 1);

  assert!(h.tracker.toggle(created.id).await.unwrap());
  assert!(h.store.habits_for(h.owner)[0].is_completed);
  assert_eq!(h.tracker.progress().await.unwrap().percentage, 1.0);

  let renamed = h.tracker.rename_habit(created.id, "Stretch 5 min").await.unwrap();
  assert_eq!(renamed.title, "Stretch 5 min");

  h.tracker.delete_habit(created.id).await.unwrap();
  assert!(h.store.habits_for(h.owner).is_empty());
  assert!(matches!(
    h.tracker.delete_habit(created.id).await,
    Err(Error::HabitNotFound(id)) if id == created.id
  ));
  assert!(matches!(h.tracker.create_habit("   ").await, Err(Error::EmptyTitle)));
}

#[tokio::test]
async fn habit_list_is_in_creation_order() {
  let h = Harness::new(Some(day(0)), day(0));
  h.store.seed(h.owner, &[("first", false), ("second", false), ("third", false)]);

  let titles: Vec<_> = h
    .tracker
    .habits()
    .await
    .unwrap()
    .into_iter()
    .map(|h| h.title)
    .collect();
  assert_eq!(titles, ["first", "second", "third"]);
}

#[tokio::test]
async fn month_history_is_sorted_and_bounded() {
  let h = Harness::new(Some(NaiveDate::from_ymd_opt(2024, 2, 27).unwrap()), day(2));
  h.store.seed(h.owner, &[("a", true)]);
  h.tracker.activate().await.unwrap();

  let feb = h
    .tracker
    .month_history(NaiveDate::from_ymd_opt(2024, 2, 10).unwrap())
    .await
    .unwrap();
  let feb_days: Vec<_> = feb.iter().map(|r| r.date).collect();
  assert_eq!(
    feb_days,
    vec![
      NaiveDate::from_ymd_opt(2024, 2, 27).unwrap(),
      NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
      NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
    ]
  );
  assert_eq!(feb[0].completion_percentage, 1.0);

  let march = h.tracker.month_history(day(0)).await.unwrap();
  assert_eq!(march.iter().map(|r| r.date).collect::<Vec<_>>(), vec![day(0), day(1)]);

  let single = h.tracker.history_for(day(1)).await.unwrap().unwrap();
  assert_eq!(single.completion_percentage, 0.0);
  assert!(h.tracker.history_for(day(2)).await.unwrap().is_none());
}
