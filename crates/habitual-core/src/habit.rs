//! Habit: a single daily task belonging to one owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, OwnerId, Result};

/// A persisted habit as returned by a [`HabitStore`](crate::store::HabitStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
  pub id:           Uuid,
  pub owner_id:     OwnerId,
  pub title:        String,
  pub is_completed: bool,
  pub created_at:   DateTime<Utc>,
}

/// Input for creating a habit. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHabit {
  pub owner_id: OwnerId,
  pub title:    String,
}

impl NewHabit {
  /// Build a new habit input, trimming the title. Fails on an empty title.
  pub fn new(owner_id: OwnerId, title: impl AsRef<str>) -> Result<Self> {
    let title = title.as_ref().trim();
    if title.is_empty() {
      return Err(Error::EmptyTitle);
    }
    Ok(Self { owner_id, title: title.to_owned() })
  }
}

/// Partial field patch applied by update-by-id. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HabitPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title:        Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub is_completed: Option<bool>,
}

impl HabitPatch {
  pub fn completed(is_completed: bool) -> Self {
    Self { title: None, is_completed: Some(is_completed) }
  }

  pub fn is_empty(&self) -> bool {
    self.title.is_none() && self.is_completed.is_none()
  }

  /// Apply the patch to an in-memory habit.
  pub fn apply(&self, habit: &mut Habit) {
    if let Some(title) = &self.title {
      habit.title = title.clone();
    }
    if let Some(done) = self.is_completed {
      habit.is_completed = done;
    }
  }
}
