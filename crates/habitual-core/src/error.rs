//! Error types for `habitual-core`.
//!
//! Everything on the rollover path is `Clone` so that callers joining an
//! in-flight rollover can receive the leader's result.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

type BoxedSource = Arc<dyn std::error::Error + Send + Sync>;

// ─── Auth ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error)]
pub enum AuthError {
  #[error("no active session")]
  NoSession,

  #[error("session expired at {at}")]
  Expired { at: DateTime<Utc> },

  #[error("credentials rejected: {0}")]
  Rejected(String),

  #[error("session backend error: {0}")]
  Backend(BoxedSource),
}

impl AuthError {
  pub fn backend<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Backend(Arc::new(err))
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error)]
pub enum StoreError {
  #[error("store call timed out after {0:?}")]
  Timeout(Duration),

  #[error("record not found: {0}")]
  NotFound(Uuid),

  #[error("store backend error: {0}")]
  Backend(BoxedSource),
}

impl StoreError {
  pub fn backend<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Backend(Arc::new(err))
  }
}

// ─── Rollover ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error)]
pub enum RolloverError {
  #[error(transparent)]
  Auth(#[from] AuthError),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error("local settings error: {0}")]
  Settings(BoxedSource),

  /// Some snapshot days were written before a later write failed. The local
  /// pointer was not advanced, so the next activation writes `pending`.
  #[error(
    "partial rollover of {stale_day}: {} day(s) written, {} pending",
    .written.len(),
    .pending.len()
  )]
  Partial {
    stale_day: NaiveDate,
    written:   Vec<NaiveDate>,
    pending:   Vec<NaiveDate>,
    #[source]
    source:    StoreError,
  },
}

impl RolloverError {
  pub fn settings<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Settings(Arc::new(err))
  }
}

// ─── Crate error ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error)]
pub enum Error {
  #[error("habit title must not be empty")]
  EmptyTitle,

  #[error("habit not found: {0}")]
  HabitNotFound(Uuid),

  #[error(transparent)]
  Auth(#[from] AuthError),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Rollover(#[from] RolloverError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
