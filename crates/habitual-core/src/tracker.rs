//! `Tracker`: the application-facing facade.
//!
//! Constructed once at process start with every collaborator injected. It
//! resolves the signed-in owner, runs the rollover on activation, and routes
//! all habit mutations through the same lock the rollover holds.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  AuthError, OwnerId, Result,
  config::TrackerConfig,
  day::Clock,
  habit::Habit,
  habit_set::{HabitSet, Progress},
  history::CompletionHistory,
  recorder::HistoryRecorder,
  rollover::{RolloverEngine, RolloverOutcome},
  session::SessionProvider,
  settings::LocalSettings,
  store::HabitStore,
};

pub struct Tracker<S, P, L, C> {
  session:  Arc<P>,
  clock:    Arc<C>,
  habits:   Arc<Mutex<HabitSet<S>>>,
  recorder: HistoryRecorder<S>,
  rollover: RolloverEngine<S, L, C>,
}

impl<S, P, L, C> Tracker<S, P, L, C>
where
  S: HabitStore,
  P: SessionProvider,
  L: LocalSettings,
  C: Clock,
{
  pub fn new(
    store: Arc<S>,
    session: Arc<P>,
    settings: Arc<L>,
    clock: Arc<C>,
    config: &TrackerConfig,
  ) -> Self {
    let timeout = config.store_timeout();
    // Owner is unknown until activation; `switch_owner` re-targets the set.
    let habits = Arc::new(Mutex::new(HabitSet::new(store.clone(), Uuid::nil(), timeout)));
    let rollover = RolloverEngine::new(
      store.clone(),
      settings,
      clock.clone(),
      habits.clone(),
      timeout,
    );
    Self {
      session,
      clock,
      habits,
      recorder: HistoryRecorder::new(store, timeout),
      rollover,
    }
  }

  // ── Session ───────────────────────────────────────────────────────────────

  /// The signed-in owner. An expired session is refreshed once before
  /// giving up.
  pub async fn owner(&self) -> Result<OwnerId> {
    let current = match self.session.current_user_id().await {
      Err(AuthError::Expired { at }) => {
        debug!(%at, "session expired; refreshing");
        self.session.refresh_session().await?;
        self.session.current_user_id().await?
      }
      other => other?,
    };
    Ok(current.ok_or(AuthError::NoSession)?)
  }

  pub async fn refresh_session(&self) -> Result<(), AuthError> {
    self.session.refresh_session().await
  }

  // ── Activation ────────────────────────────────────────────────────────────

  /// Called whenever the app comes to the foreground: runs the rollover
  /// check and makes sure the habit set is loaded for the owner.
  pub async fn activate(&self) -> Result<RolloverOutcome> {
    let owner_id = self.owner().await?;
    let outcome = self.rollover.run_rollover_check(owner_id).await?;
    if outcome.rolled_over() {
      info!(%owner_id, "activated after rollover");
    }
    // A rollover leaves the set freshly fetched; otherwise load it now.
    self.habit_set(owner_id).await?;
    Ok(outcome)
  }

  pub fn today(&self) -> NaiveDate { self.clock.today() }

  // ── Habits ────────────────────────────────────────────────────────────────

  pub async fn habits(&self) -> Result<Vec<Habit>> {
    let owner_id = self.owner().await?;
    Ok(self.habit_set(owner_id).await?.habits().to_vec())
  }

  pub async fn progress(&self) -> Result<Progress> {
    let owner_id = self.owner().await?;
    Ok(self.habit_set(owner_id).await?.progress())
  }

  /// Re-fetch the habit list from the store.
  pub async fn reload(&self) -> Result<Vec<Habit>> {
    let owner_id = self.owner().await?;
    let mut set = self.habit_set(owner_id).await?;
    set.refresh().await?;
    Ok(set.habits().to_vec())
  }

  pub async fn create_habit(&self, title: &str) -> Result<Habit> {
    let owner_id = self.owner().await?;
    self.habit_set(owner_id).await?.create(title).await
  }

  pub async fn set_completed(&self, id: Uuid, is_completed: bool) -> Result<Habit> {
    let owner_id = self.owner().await?;
    self.habit_set(owner_id).await?.set_completed(id, is_completed).await
  }

  pub async fn toggle(&self, id: Uuid) -> Result<bool> {
    let owner_id = self.owner().await?;
    self.habit_set(owner_id).await?.toggle(id).await
  }

  pub async fn rename_habit(&self, id: Uuid, title: &str) -> Result<Habit> {
    let owner_id = self.owner().await?;
    self.habit_set(owner_id).await?.rename(id, title).await
  }

  pub async fn delete_habit(&self, id: Uuid) -> Result<()> {
    let owner_id = self.owner().await?;
    self.habit_set(owner_id).await?.delete(id).await
  }

  // ── History ───────────────────────────────────────────────────────────────

  /// Snapshots for the calendar month containing `day`, oldest first.
  pub async fn month_history(&self, day: NaiveDate) -> Result<Vec<CompletionHistory>> {
    let owner_id = self.owner().await?;
    Ok(self.recorder.query_month(owner_id, day).await?)
  }

  pub async fn history_for(&self, day: NaiveDate) -> Result<Option<CompletionHistory>> {
    let owner_id = self.owner().await?;
    Ok(self.recorder.snapshot_for(owner_id, day).await?)
  }

  /// Lock the habit set for `owner_id`, loading it first if needed. Waits
  /// for any rollover in progress.
  async fn habit_set(&self, owner_id: OwnerId) -> Result<MutexGuard<'_, HabitSet<S>>> {
    let mut set = self.habits.lock().await;
    set.switch_owner(owner_id);
    if !set.is_loaded() {
      set.refresh().await?;
    }
    Ok(set)
  }
}
