//! [`SqliteSettings`]: per-installation settings in a small SQLite file.

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::OptionalExtension as _;

use habitual_core::settings::LocalSettings;

use crate::{
  Result,
  encode::{decode_date, encode_date},
  schema::SETTINGS_SCHEMA,
};

/// Key/value settings that survive process restarts.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteSettings {
  conn: tokio_rusqlite::Connection,
}

impl SqliteSettings {
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let settings = Self { conn };
    settings.init_schema().await?;
    Ok(settings)
  }

  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let settings = Self { conn };
    settings.init_schema().await?;
    Ok(settings)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SETTINGS_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

impl LocalSettings for SqliteSettings {
  type Error = crate::Error;

  async fn get_date(&self, key: &str) -> Result<Option<NaiveDate>> {
    let key = key.to_owned();

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value FROM settings WHERE key = ?1",
              rusqlite::params![key],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.as_deref().map(decode_date).transpose()
  }

  async fn set_date(&self, key: &str, date: NaiveDate) -> Result<()> {
    let key = key.to_owned();
    let value = encode_date(date);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO settings (key, value) VALUES (?1, ?2)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value",
          rusqlite::params![key, value],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
