//! `GET /session`: issues a lease for the authenticated caller.

use axum::{Json, extract::State};
use chrono::{TimeDelta, Utc};
use habitual_core::{session::SessionLease, store::HabitStore};

use crate::{AppState, auth::Authenticated, error::ApiError};

/// `GET /session`
pub async fn lease<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner_id): Authenticated,
) -> Result<Json<SessionLease>, ApiError>
where
  S: HabitStore + Clone + 'static,
{
  let ttl = TimeDelta::try_seconds(state.config.lease_secs.try_into().unwrap_or(i64::MAX))
    .unwrap_or(TimeDelta::MAX);
  let now = Utc::now();
  let expires_at = now.checked_add_signed(ttl).unwrap_or(now);
  Ok(Json(SessionLease { owner_id, expires_at }))
}
