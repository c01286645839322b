//! Tunables shared by the tracker, rollover engine, and session clients.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtime knobs for a [`Tracker`](crate::tracker::Tracker).
///
/// Every field has a default, so an empty config table deserialises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
  /// Upper bound on any single store call, in seconds.
  pub store_timeout_secs:          u64,
  /// Refresh a session lease this many seconds before it expires.
  pub session_refresh_margin_secs: u64,
}

impl Default for TrackerConfig {
  fn default() -> Self {
    Self { store_timeout_secs: 15, session_refresh_margin_secs: 60 }
  }
}

impl TrackerConfig {
  pub fn store_timeout(&self) -> Duration {
    Duration::from_secs(self.store_timeout_secs)
  }

  pub fn session_refresh_margin(&self) -> chrono::TimeDelta {
    i64::try_from(self.session_refresh_margin_secs)
      .ok()
      .and_then(chrono::TimeDelta::try_seconds)
      .unwrap_or(chrono::TimeDelta::MAX)
  }
}
