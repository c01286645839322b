//! The `HabitStore` trait: the remote record store behind the tracker.
//!
//! The trait is implemented by storage backends (`habitual-store-sqlite`) and
//! by the HTTP client in `habitual-cli`. The core depends on this abstraction,
//! not on any concrete backend.

use std::{future::Future, time::Duration};

use uuid::Uuid;

use crate::{
  OwnerId, StoreError,
  habit::{Habit, HabitPatch, NewHabit},
  history::{CompletionHistory, HistoryRange, NewSnapshot},
};

// ─── Trait ───────────────────────────────────────────────────────────────────

/// CRUD access to the `habits` and `completion_history` collections.
///
/// Every read and write is scoped by owner: a backend never returns or
/// touches a record belonging to a different owner.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait HabitStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Habits ────────────────────────────────────────────────────────────

  /// All habits for `owner_id`, in no guaranteed order.
  fn list_habits(
    &self,
    owner_id: OwnerId,
  ) -> impl Future<Output = Result<Vec<Habit>, Self::Error>> + Send + '_;

  /// Persist a new habit. `id` and `created_at` are assigned by the store;
  /// `is_completed` starts out `false`.
  fn insert_habit(
    &self,
    input: NewHabit,
  ) -> impl Future<Output = Result<Habit, Self::Error>> + Send + '_;

  /// Apply a partial patch to one habit. Returns `None` if no habit with
  /// `id` exists for `owner_id`.
  fn update_habit(
    &self,
    owner_id: OwnerId,
    id: Uuid,
    patch: HabitPatch,
  ) -> impl Future<Output = Result<Option<Habit>, Self::Error>> + Send + '_;

  /// Delete one habit. Returns `false` if nothing was deleted.
  fn delete_habit(
    &self,
    owner_id: OwnerId,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Completion history ────────────────────────────────────────────────

  /// History rows for `owner_id`, optionally restricted to
  /// `range.start <= date < range.end`. Order is not guaranteed.
  fn list_history(
    &self,
    owner_id: OwnerId,
    range: Option<HistoryRange>,
  ) -> impl Future<Output = Result<Vec<CompletionHistory>, Self::Error>> + Send + '_;

  /// Append a history row. No existence check is made.
  fn insert_history(
    &self,
    input: NewSnapshot,
  ) -> impl Future<Output = Result<CompletionHistory, Self::Error>> + Send + '_;
}

// ─── Call bounding ───────────────────────────────────────────────────────────

/// Await a store future for at most `limit`, folding backend errors and
/// timeouts into [`StoreError`].
pub async fn bounded<T, E>(
  limit: Duration,
  call: impl Future<Output = Result<T, E>>,
) -> Result<T, StoreError>
where
  E: std::error::Error + Send + Sync + 'static,
{
  match tokio::time::timeout(limit, call).await {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(e)) => Err(StoreError::backend(e)),
    Err(_) => Err(StoreError::Timeout(limit)),
  }
}
