//! Handlers for `/habits` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/habits` | Caller's habits, oldest first |
//! | `POST`   | `/habits` | Body: `{"title":"Read"}` → 201 |
//! | `PATCH`  | `/habits/{id}` | Body: `{"title"?, "is_completed"?}`; 404 if not found |
//! | `DELETE` | `/habits/{id}` | 204, or 404 if not found |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use habitual_core::{
  habit::{Habit, HabitPatch, NewHabit},
  store::HabitStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /habits`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner_id): Authenticated,
) -> Result<Json<Vec<Habit>>, ApiError>
where
  S: HabitStore + Clone + 'static,
{
  let mut habits = state
    .store
    .list_habits(owner_id)
    .await
    .map_err(ApiError::store)?;
  habits.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
  Ok(Json(habits))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub title: String,
}

/// `POST /habits`. Body: `{"title":"Read"}`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner_id): Authenticated,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HabitStore + Clone + 'static,
{
  let input = NewHabit::new(owner_id, &body.title)?;
  let habit = state
    .store
    .insert_habit(input)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(habit)))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// `PATCH /habits/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner_id): Authenticated,
  Path(id): Path<Uuid>,
  Json(mut patch): Json<HabitPatch>,
) -> Result<Json<Habit>, ApiError>
where
  S: HabitStore + Clone + 'static,
{
  if let Some(title) = patch.title.take() {
    patch.title = Some(NewHabit::new(owner_id, title)?.title);
  }
  let habit = state
    .store
    .update_habit(owner_id, id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("habit {id} not found")))?;
  Ok(Json(habit))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /habits/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner_id): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: HabitStore + Clone + 'static,
{
  let deleted = state
    .store
    .delete_habit(owner_id, id)
    .await
    .map_err(ApiError::store)?;
  if !deleted {
    return Err(ApiError::NotFound(format!("habit {id} not found")));
  }
  Ok(StatusCode::NO_CONTENT)
}
