//! HTTP Basic-auth extractor and standalone verifier.
//!
//! Each configured user maps to exactly one owner id; every record the
//! caller reads or writes is scoped to it.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use habitual_core::{OwnerId, store::HabitStore};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

/// One account accepted by this server instance.
#[derive(Debug, Clone, Deserialize)]
pub struct UserCredential {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub owner_id:      OwnerId,
}

/// Credentials accepted as valid for this server instance.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
  pub users: Vec<UserCredential>,
}

/// The authenticated caller's owner id.
pub struct Authenticated(pub OwnerId);

/// Verify Basic credentials from headers and resolve the caller's owner.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<OwnerId, ApiError> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  let user = config
    .users
    .iter()
    .find(|u| u.username == username)
    .ok_or(ApiError::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&user.password_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(user.owner_id)
}

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: HabitStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let owner_id = verify_auth(&parts.headers, &state.auth).inspect_err(|_| {
      tracing::debug!(path = %parts.uri.path(), "rejected credentials");
    })?;
    Ok(Authenticated(owner_id))
  }
}
