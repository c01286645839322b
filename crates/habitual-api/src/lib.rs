//! JSON REST API for Habitual.
//!
//! Exposes an axum [`Router`] backed by any [`HabitStore`]. Every route
//! requires HTTP Basic credentials and is scoped to the caller's owner id.
//!
//! # Mounting
//!
//! ```rust,ignore
//! axum::serve(listener, habitual_api::router(state)).await?;
//! ```

pub mod auth;
pub mod error;
pub mod habits;
pub mod history;
pub mod session;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, patch},
};
use habitual_core::store::HabitStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, UserCredential};

pub use error::ApiError;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `HABITUAL_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  /// Lifetime of a session lease handed out by `GET /api/session`.
  #[serde(default = "default_lease_secs")]
  pub lease_secs: u64,
  #[serde(default)]
  pub users:      Vec<UserCredential>,
}

fn default_lease_secs() -> u64 { 3600 }

impl ServerConfig {
  pub fn auth(&self) -> AuthConfig { AuthConfig { users: self.users.clone() } }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  pub auth:   Arc<AuthConfig>,
}

impl<S> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    Self {
      store:  Arc::new(store),
      auth:   Arc::new(config.auth()),
      config: Arc::new(config),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application router, with the API nested under `/api`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: HabitStore + Clone + 'static,
{
  let api = Router::new()
    .route("/session", get(session::lease::<S>))
    .route("/habits", get(habits::list::<S>).post(habits::create::<S>))
    .route("/habits/{id}", patch(habits::update::<S>).delete(habits::delete::<S>))
    .route("/history", get(history::list::<S>).post(history::create::<S>));

  Router::new()
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
