//! Handlers for `/history` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/history` | Optional `?start=YYYY-MM-DD&end=YYYY-MM-DD` (`start <= date < end`) |
//! | `POST` | `/history` | Body: `{"date":"2024-03-01","completion_percentage":0.5}` → 201 |

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use habitual_core::{
  history::{self, CompletionHistory, HistoryRange, NewSnapshot},
  store::HabitStore,
};
use serde::Deserialize;

use crate::{AppState, auth::Authenticated, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub start: Option<NaiveDate>,
  pub end:   Option<NaiveDate>,
}

impl ListParams {
  fn range(&self) -> Result<Option<HistoryRange>, ApiError> {
    let range = match (self.start, self.end) {
      (None, None) => return Ok(None),
      (start, end) => HistoryRange::new(
        start.unwrap_or(NaiveDate::MIN),
        end.unwrap_or(NaiveDate::MAX),
      ),
    };
    if range.start > range.end {
      return Err(ApiError::BadRequest(format!(
        "start {} is after end {}",
        range.start, range.end
      )));
    }
    Ok(Some(range))
  }
}

/// `GET /history[?start=..][&end=..]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner_id): Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<CompletionHistory>>, ApiError>
where
  S: HabitStore + Clone + 'static,
{
  let range = params.range()?;
  let mut rows = state
    .store
    .list_history(owner_id, range)
    .await
    .map_err(ApiError::store)?;
  history::sort_by_date(&mut rows);
  Ok(Json(rows))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub date:                  NaiveDate,
  pub completion_percentage: f64,
}

/// `POST /history`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner_id): Authenticated,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HabitStore + Clone + 'static,
{
  let input = NewSnapshot::new(owner_id, body.date, body.completion_percentage);
  let row = state
    .store
    .insert_history(input)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(row)))
}
