//! Session collaborator and the lease value that replaces a staleness timer.
//!
//! A [`SessionLease`] is a plain value: who the session belongs to and when
//! it stops being valid. Whether it must be refreshed is a pure function of
//! the lease and the current time ([`needs_refresh`]), so no background task
//! is needed to keep a session warm.

use std::future::Future;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuthError, OwnerId};

/// The authenticated owner and the instant the session expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLease {
  pub owner_id:   OwnerId,
  pub expires_at: DateTime<Utc>,
}

impl SessionLease {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool { now >= self.expires_at }
}

/// `true` once `now` is within `margin` of the lease's expiry (or past it).
pub fn needs_refresh(lease: &SessionLease, now: DateTime<Utc>, margin: TimeDelta) -> bool {
  match now.checked_add_signed(margin) {
    Some(deadline) => deadline >= lease.expires_at,
    None => true,
  }
}

/// Resolves the authenticated owner.
pub trait SessionProvider: Send + Sync {
  /// The owner of the current session, or `None` when signed out.
  ///
  /// Implementations may return [`AuthError::Expired`] when a session exists
  /// but can no longer be used without [`refresh_session`](Self::refresh_session).
  fn current_user_id(
    &self,
  ) -> impl Future<Output = Result<Option<OwnerId>, AuthError>> + Send + '_;

  /// Re-establish (or invalidate) the session with the auth backend.
  fn refresh_session(&self) -> impl Future<Output = Result<(), AuthError>> + Send + '_;
}
