//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings with a fixed microsecond precision so
//! that lexical order matches time order. Calendar days are `YYYY-MM-DD`.
//! UUIDs are hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use habitual_core::{habit::Habit, history::CompletionHistory};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const HABIT_COLUMNS: &str = "id, owner_id, title, is_completed, created_at";

/// Raw values read directly from a `habits` row.
pub struct RawHabit {
  pub id:           String,
  pub owner_id:     String,
  pub title:        String,
  pub is_completed: bool,
  pub created_at:   String,
}

impl RawHabit {
  /// Map a row selected with [`HABIT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      owner_id:     row.get(1)?,
      title:        row.get(2)?,
      is_completed: row.get(3)?,
      created_at:   row.get(4)?,
    })
  }

  pub fn into_habit(self) -> Result<Habit> {
    Ok(Habit {
      id:           decode_uuid(&self.id)?,
      owner_id:     decode_uuid(&self.owner_id)?,
      title:        self.title,
      is_completed: self.is_completed,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const HISTORY_COLUMNS: &str = "id, owner_id, date, completion_percentage, created_at";

/// Raw values read directly from a `completion_history` row.
pub struct RawHistory {
  pub id:                    String,
  pub owner_id:              String,
  pub date:                  String,
  pub completion_percentage: f64,
  pub created_at:            String,
}

impl RawHistory {
  /// Map a row selected with [`HISTORY_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                    row.get(0)?,
      owner_id:              row.get(1)?,
      date:                  row.get(2)?,
      completion_percentage: row.get(3)?,
      created_at:            row.get(4)?,
    })
  }

  pub fn into_history(self) -> Result<CompletionHistory> {
    Ok(CompletionHistory {
      id:                    decode_uuid(&self.id)?,
      owner_id:              decode_uuid(&self.owner_id)?,
      date:                  decode_date(&self.date)?,
      completion_percentage: self.completion_percentage,
      created_at:            decode_dt(&self.created_at)?,
    })
  }
}
