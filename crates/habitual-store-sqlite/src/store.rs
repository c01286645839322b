//! [`SqliteStore`]: the SQLite implementation of [`HabitStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use habitual_core::{
  OwnerId,
  habit::{Habit, HabitPatch, NewHabit},
  history::{CompletionHistory, HistoryRange, NewSnapshot},
  store::HabitStore,
};

use crate::{
  Result,
  encode::{
    HABIT_COLUMNS, HISTORY_COLUMNS, RawHabit, RawHistory, encode_date, encode_dt,
    encode_uuid,
  },
  schema::STORE_SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Habits and completion history backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(STORE_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_habit(&self, owner_id: OwnerId, id: Uuid) -> Result<Option<Habit>> {
    let owner_str = encode_uuid(owner_id);
    let id_str = encode_uuid(id);

    let raw: Option<RawHabit> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1 AND owner_id = ?2"),
              rusqlite::params![id_str, owner_str],
              RawHabit::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawHabit::into_habit).transpose()
  }
}

// ─── HabitStore impl ─────────────────────────────────────────────────────────

impl HabitStore for SqliteStore {
  type Error = crate::Error;

  // ── Habits ────────────────────────────────────────────────────────────────

  async fn list_habits(&self, owner_id: OwnerId) -> Result<Vec<Habit>> {
    let owner_str = encode_uuid(owner_id);

    let raws: Vec<RawHabit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {HABIT_COLUMNS} FROM habits WHERE owner_id = ?1 ORDER BY created_at, id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner_str], RawHabit::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHabit::into_habit).collect()
  }

  async fn insert_habit(&self, input: NewHabit) -> Result<Habit> {
    let habit = Habit {
      id:           Uuid::new_v4(),
      owner_id:     input.owner_id,
      title:        input.title,
      is_completed: false,
      created_at:   Utc::now(),
    };

    let id_str    = encode_uuid(habit.id);
    let owner_str = encode_uuid(habit.owner_id);
    let title     = habit.title.clone();
    let at_str    = encode_dt(habit.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO habits (id, owner_id, title, is_completed, created_at)
           VALUES (?1, ?2, ?3, 0, ?4)",
          rusqlite::params![id_str, owner_str, title, at_str],
        )?;
        Ok(())
      })
      .await?;

    debug!(habit_id = %habit.id, "habit inserted");
    Ok(habit)
  }

  async fn update_habit(
    &self,
    owner_id: OwnerId,
    id: Uuid,
    patch: HabitPatch,
  ) -> Result<Option<Habit>> {
    if patch.is_empty() {
      return self.get_habit(owner_id, id).await;
    }

    let owner_str = encode_uuid(owner_id);
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE habits
              SET title        = COALESCE(?3, title),
                  is_completed = COALESCE(?4, is_completed)
            WHERE id = ?1 AND owner_id = ?2",
          rusqlite::params![id_str, owner_str, patch.title, patch.is_completed],
        )?;
        Ok(n)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.get_habit(owner_id, id).await
  }

  async fn delete_habit(&self, owner_id: OwnerId, id: Uuid) -> Result<bool> {
    let owner_str = encode_uuid(owner_id);
    let id_str = encode_uuid(id);

    let deleted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM habits WHERE id = ?1 AND owner_id = ?2",
          rusqlite::params![id_str, owner_str],
        )?;
        Ok(n)
      })
      .await?;

    Ok(deleted > 0)
  }

  // ── Completion history ────────────────────────────────────────────────────

  async fn list_history(
    &self,
    owner_id: OwnerId,
    range: Option<HistoryRange>,
  ) -> Result<Vec<CompletionHistory>> {
    let owner_str = encode_uuid(owner_id);
    let bounds = range.map(|r| (encode_date(r.start), encode_date(r.end)));

    let raws: Vec<RawHistory> = self
      .conn
      .call(move |conn| {
        let rows = if let Some((start, end)) = bounds {
          let mut stmt = conn.prepare(&format!(
            "SELECT {HISTORY_COLUMNS} FROM completion_history
              WHERE owner_id = ?1 AND date >= ?2 AND date < ?3
              ORDER BY date, created_at"
          ))?;
          stmt
            .query_map(rusqlite::params![owner_str, start, end], RawHistory::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {HISTORY_COLUMNS} FROM completion_history
              WHERE owner_id = ?1
              ORDER BY date, created_at"
          ))?;
          stmt
            .query_map(rusqlite::params![owner_str], RawHistory::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistory::into_history).collect()
  }

  async fn insert_history(&self, input: NewSnapshot) -> Result<CompletionHistory> {
    let row = CompletionHistory {
      id:                    Uuid::new_v4(),
      owner_id:              input.owner_id,
      date:                  input.date,
      completion_percentage: input.completion_percentage,
      created_at:            Utc::now(),
    };

    let id_str    = encode_uuid(row.id);
    let owner_str = encode_uuid(row.owner_id);
    let date_str  = encode_date(row.date);
    let pct       = row.completion_percentage;
    let at_str    = encode_dt(row.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO completion_history
             (id, owner_id, date, completion_percentage, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, owner_str, date_str, pct, at_str],
        )?;
        Ok(())
      })
      .await?;

    debug!(date = %row.date, percentage = pct, "history row inserted");
    Ok(row)
  }
}
