//! Async HTTP client wrapping the Habitual JSON API.
//!
//! [`ApiClient`] is both the tracker's [`HabitStore`] and its
//! [`SessionProvider`]: the lease from `GET /api/session` is cached and only
//! re-fetched once it comes within the refresh margin of expiring.

use std::{sync::Mutex, time::Duration};

use chrono::{TimeDelta, Utc};
use habitual_core::{
  AuthError, OwnerId,
  habit::{Habit, HabitPatch, NewHabit},
  history::{CompletionHistory, HistoryRange, NewSnapshot},
  session::{SessionLease, SessionProvider, needs_refresh},
  store::HabitStore,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{method} {path} → {status}: {message}")]
  Status {
    method:  Method,
    path:    String,
    status:  StatusCode,
    message: String,
  },
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Connection settings for the Habitual API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// Async HTTP client for the Habitual JSON REST API.
pub struct ApiClient {
  client:         Client,
  config:         ApiConfig,
  refresh_margin: TimeDelta,
  lease:          Mutex<Option<SessionLease>>,
}

impl ApiClient {
  pub fn new(config: ApiConfig, refresh_margin: TimeDelta) -> anyhow::Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;
    Ok(Self { client, config, refresh_margin, lease: Mutex::new(None) })
  }

  /// The cached session lease, if one has been fetched.
  pub fn lease(&self) -> Option<SessionLease> {
    *self.lease.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    let req = self.client.request(method, self.url(path));
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  /// Send `req`, turning any non-success status into [`ClientError::Status`].
  async fn send(
    &self,
    method: Method,
    path: &str,
    req: RequestBuilder,
  ) -> Result<Response, ClientError> {
    let resp = req.send().await?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let message = match resp.json::<ErrorBody>().await {
      Ok(body) => body.error,
      Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
    };
    Err(ClientError::Status { method, path: path.to_string(), status, message })
  }

  async fn send_json<T: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
    req: RequestBuilder,
  ) -> Result<T, ClientError> {
    Ok(self.send(method, path, req).await?.json().await?)
  }

  fn store_lease(&self, lease: SessionLease) {
    *self.lease.lock().unwrap_or_else(|e| e.into_inner()) = Some(lease);
  }
}

fn is_not_found(err: &ClientError) -> bool {
  matches!(err, ClientError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
}

fn history_query(range: Option<HistoryRange>) -> Vec<(&'static str, String)> {
  match range {
    Some(r) => vec![("start", r.start.to_string()), ("end", r.end.to_string())],
    None => Vec::new(),
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

impl SessionProvider for ApiClient {
  async fn current_user_id(&self) -> Result<Option<OwnerId>, AuthError> {
    if self.config.username.is_empty() {
      return Ok(None);
    }

    let now = Utc::now();
    match self.lease() {
      Some(lease) if !needs_refresh(&lease, now, self.refresh_margin) => {
        Ok(Some(lease.owner_id))
      }
      Some(lease) if lease.is_expired(now) => Err(AuthError::Expired { at: lease.expires_at }),
      _ => {
        self.refresh_session().await?;
        Ok(self.lease().map(|l| l.owner_id))
      }
    }
  }

  async fn refresh_session(&self) -> Result<(), AuthError> {
    let path = "/session";
    let lease: SessionLease = self
      .send_json(Method::GET, path, self.request(Method::GET, path))
      .await
      .map_err(|e| match e {
        ClientError::Status { status, message, .. } if status == StatusCode::UNAUTHORIZED => {
          AuthError::Rejected(message)
        }
        other => AuthError::backend(other),
      })?;
    debug!(owner_id = %lease.owner_id, expires_at = %lease.expires_at, "session lease refreshed");
    self.store_lease(lease);
    Ok(())
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

impl HabitStore for ApiClient {
  type Error = ClientError;

  // ── Habits ────────────────────────────────────────────────────────────────

  /// `GET /api/habits`
  async fn list_habits(&self, _owner_id: OwnerId) -> Result<Vec<Habit>, ClientError> {
    let path = "/habits";
    self.send_json(Method::GET, path, self.request(Method::GET, path)).await
  }

  /// `POST /api/habits`
  async fn insert_habit(&self, input: NewHabit) -> Result<Habit, ClientError> {
    let path = "/habits";
    let req = self.request(Method::POST, path).json(&json!({ "title": input.title }));
    self.send_json(Method::POST, path, req).await
  }

  /// `PATCH /api/habits/{id}`
  async fn update_habit(
    &self,
    _owner_id: OwnerId,
    id: Uuid,
    patch: HabitPatch,
  ) -> Result<Option<Habit>, ClientError> {
    let path = format!("/habits/{id}");
    let req = self.request(Method::PATCH, &path).json(&patch);
    match self.send_json(Method::PATCH, &path, req).await {
      Ok(habit) => Ok(Some(habit)),
      Err(e) if is_not_found(&e) => Ok(None),
      Err(e) => Err(e),
    }
  }

  /// `DELETE /api/habits/{id}`
  async fn delete_habit(&self, _owner_id: OwnerId, id: Uuid) -> Result<bool, ClientError> {
    let path = format!("/habits/{id}");
    match self.send(Method::DELETE, &path, self.request(Method::DELETE, &path)).await {
      Ok(_) => Ok(true),
      Err(e) if is_not_found(&e) => Ok(false),
      Err(e) => Err(e),
    }
  }

  // ── Completion history ────────────────────────────────────────────────────

  /// `GET /api/history[?start=..&end=..]`
  async fn list_history(
    &self,
    _owner_id: OwnerId,
    range: Option<HistoryRange>,
  ) -> Result<Vec<CompletionHistory>, ClientError> {
    let path = "/history";
    let req = self.request(Method::GET, path).query(&history_query(range));
    self.send_json(Method::GET, path, req).await
  }

  /// `POST /api/history`
  async fn insert_history(&self, input: NewSnapshot) -> Result<CompletionHistory, ClientError> {
    let path = "/history";
    let req = self.request(Method::POST, path).json(&json!({
      "date": input.date,
      "completion_percentage": input.completion_percentage,
    }));
    self.send_json(Method::POST, path, req).await
  }
}
