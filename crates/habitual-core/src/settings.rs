//! Local, per-installation settings that survive process restarts.

use std::{collections::HashMap, convert::Infallible, future::Future, sync::Mutex};

use chrono::NaiveDate;

/// Key of the slot holding the last calendar day the app was opened.
pub const LAST_OPENED_DATE_KEY: &str = "lastOpenedDate";

/// A persistent string-keyed slot store for calendar days.
pub trait LocalSettings: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_date<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<NaiveDate>, Self::Error>> + Send + 'a;

  fn set_date<'a>(
    &'a self,
    key: &'a str,
    date: NaiveDate,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// Process-local settings. Nothing survives a restart; used in tests and as
/// a fallback when no settings file is configured.
#[derive(Debug, Default)]
pub struct MemorySettings {
  slots: Mutex<HashMap<String, NaiveDate>>,
}

impl MemorySettings {
  pub fn new() -> Self { Self::default() }

  /// Settings with `lastOpenedDate` already set.
  pub fn last_opened(date: NaiveDate) -> Self {
    let settings = Self::default();
    settings.put(LAST_OPENED_DATE_KEY, date);
    settings
  }

  pub fn peek(&self, key: &str) -> Option<NaiveDate> {
    self.slots.lock().unwrap_or_else(|e| e.into_inner()).get(key).copied()
  }

  fn put(&self, key: &str, date: NaiveDate) {
    self
      .slots
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .insert(key.to_owned(), date);
  }
}

impl LocalSettings for MemorySettings {
  type Error = Infallible;

  async fn get_date(&self, key: &str) -> Result<Option<NaiveDate>, Infallible> {
    Ok(self.peek(key))
  }

  async fn set_date(&self, key: &str, date: NaiveDate) -> Result<(), Infallible> {
    self.put(key, date);
    Ok(())
  }
}
