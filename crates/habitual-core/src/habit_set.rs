//! `HabitSet`: the in-memory view of one owner's habits for the current day.
//!
//! The set is a cache: the store is the source of truth. Reads are served
//! from memory; every mutation is written through to the store first and
//! only then reflected locally. Toggles and deletes patch the local copy,
//! creates trigger a full refetch to pick up the server-assigned id.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, OwnerId, Result, StoreError,
  habit::{Habit, HabitPatch, NewHabit},
  store::{HabitStore, bounded},
};

// ─── Metrics ─────────────────────────────────────────────────────────────────

/// Completion counters for a set of habits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
  pub completed:  usize,
  pub total:      usize,
  pub percentage: f64,
}

impl Progress {
  pub fn of(habits: &[Habit]) -> Self {
    let completed = completed_count(habits);
    let total = habits.len();
    Self { completed, total, percentage: completion_percentage(habits) }
  }
}

pub fn completed_count(habits: &[Habit]) -> usize {
  habits.iter().filter(|h| h.is_completed).count()
}

/// `completed / total`, or `0.0` for an empty slice.
pub fn completion_percentage(habits: &[Habit]) -> f64 {
  if habits.is_empty() {
    return 0.0;
  }
  completed_count(habits) as f64 / habits.len() as f64
}

// ─── Set ─────────────────────────────────────────────────────────────────────

pub struct HabitSet<S> {
  store:    Arc<S>,
  owner_id: OwnerId,
  habits:   Vec<Habit>,
  loaded:   bool,
  timeout:  Duration,
}

impl<S: HabitStore> HabitSet<S> {
  /// An empty, not-yet-loaded set for `owner_id`.
  pub fn new(store: Arc<S>, owner_id: OwnerId, timeout: Duration) -> Self {
    Self { store, owner_id, habits: Vec::new(), loaded: false, timeout }
  }

  pub fn owner_id(&self) -> OwnerId { self.owner_id }

  /// Whether the set has been fetched from the store at least once.
  pub fn is_loaded(&self) -> bool { self.loaded }

  pub fn habits(&self) -> &[Habit] { &self.habits }

  pub fn get(&self, id: Uuid) -> Option<&Habit> {
    self.habits.iter().find(|h| h.id == id)
  }

  pub fn completed_count(&self) -> usize { completed_count(&self.habits) }

  pub fn total_count(&self) -> usize { self.habits.len() }

  pub fn completion_percentage(&self) -> f64 { completion_percentage(&self.habits) }

  pub fn progress(&self) -> Progress { Progress::of(&self.habits) }

  /// Point the set at a different owner. The contents are dropped and the
  /// set must be refreshed before use.
  pub fn switch_owner(&mut self, owner_id: OwnerId) {
    if owner_id != self.owner_id {
      debug!(from = %self.owner_id, to = %owner_id, "habit set switching owner");
      self.owner_id = owner_id;
      self.habits.clear();
      self.loaded = false;
    }
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// Replace the contents with a full refetch from the store.
  pub async fn refresh(&mut self) -> Result<(), StoreError> {
    let mut habits = bounded(self.timeout, self.store.list_habits(self.owner_id)).await?;
    habits.retain(|h| h.owner_id == self.owner_id);
    habits.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    self.habits = habits;
    self.loaded = true;
    Ok(())
  }

  // ── Mutations ─────────────────────────────────────────────────────────────

  pub async fn create(&mut self, title: &str) -> Result<Habit> {
    let input = NewHabit::new(self.owner_id, title)?;
    let habit = bounded(self.timeout, self.store.insert_habit(input)).await?;
    debug!(habit_id = %habit.id, "habit created");
    self.refresh().await?;
    Ok(habit)
  }

  pub async fn set_completed(&mut self, id: Uuid, is_completed: bool) -> Result<Habit> {
    self.patch(id, HabitPatch::completed(is_completed)).await
  }

  /// Flip a habit's completion. Returns the new state.
  pub async fn toggle(&mut self, id: Uuid) -> Result<bool> {
    let current = self.get(id).ok_or(Error::HabitNotFound(id))?.is_completed;
    let habit = self.set_completed(id, !current).await?;
    Ok(habit.is_completed)
  }

  pub async fn rename(&mut self, id: Uuid, title: &str) -> Result<Habit> {
    let title = NewHabit::new(self.owner_id, title)?.title;
    self.patch(id, HabitPatch { title: Some(title), is_completed: None }).await
  }

  pub async fn delete(&mut self, id: Uuid) -> Result<()> {
    let deleted = bounded(self.timeout, self.store.delete_habit(self.owner_id, id)).await?;
    self.habits.retain(|h| h.id != id);
    if !deleted {
      return Err(Error::HabitNotFound(id));
    }
    Ok(())
  }

  /// Mark every completed habit incomplete through the store, then refetch.
  /// Returns the number of habits that were reset.
  ///
  /// Safe to repeat: a second pass finds nothing completed and only
  /// refetches.
  pub async fn reset_all(&mut self) -> Result<usize, StoreError> {
    let completed: Vec<Uuid> = self
      .habits
      .iter()
      .filter(|h| h.is_completed)
      .map(|h| h.id)
      .collect();

    for id in &completed {
      let patched = bounded(
        self.timeout,
        self.store.update_habit(self.owner_id, *id, HabitPatch::completed(false)),
      )
      .await?;
      match patched {
        Some(habit) => self.replace(habit),
        // Deleted elsewhere since the last refetch; the refetch below drops it.
        None => debug!(habit_id = %id, "habit vanished during reset"),
      }
    }

    self.refresh().await?;
    Ok(completed.len())
  }

  async fn patch(&mut self, id: Uuid, patch: HabitPatch) -> Result<Habit> {
    let updated = bounded(
      self.timeout,
      self.store.update_habit(self.owner_id, id, patch),
    )
    .await?;

    match updated {
      Some(habit) => {
        self.replace(habit.clone());
        Ok(habit)
      }
      None => {
        self.habits.retain(|h| h.id != id);
        Err(Error::HabitNotFound(id))
      }
    }
  }

  fn replace(&mut self, habit: Habit) {
    if let Some(slot) = self.habits.iter_mut().find(|h| h.id == habit.id) {
      *slot = habit;
    }
  }
}
