//! Per-key single-flight execution.
//!
//! While a call for a key is running, further calls for the same key do not
//! start their own work: they wait for the running call and receive a clone
//! of its result. Once the running call finishes, the next call for that key
//! starts fresh.

use std::{
  collections::HashMap,
  future::Future,
  hash::Hash,
  sync::{Mutex, PoisonError},
};

use tokio::sync::watch;

pub struct SingleFlight<K, T> {
  inflight: Mutex<HashMap<K, watch::Receiver<Option<T>>>>,
}

enum Role<T> {
  Leader(watch::Sender<Option<T>>),
  Follower(watch::Receiver<Option<T>>),
}

impl<K, T> Default for SingleFlight<K, T> {
  fn default() -> Self { Self { inflight: Mutex::new(HashMap::new()) } }
}

impl<K, T> SingleFlight<K, T>
where
  K: Eq + Hash + Clone,
  T: Clone,
{
  pub fn new() -> Self { Self::default() }

  /// Whether a call for `key` is currently running.
  pub fn in_flight(&self, key: &K) -> bool {
    self
      .inflight
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .contains_key(key)
  }

  /// Run `work` for `key`, or join the call already running for it.
  ///
  /// If the running call is dropped before finishing, one of the waiting
  /// callers takes over and runs its own `work`.
  pub async fn run<F, Fut>(&self, key: K, work: F) -> T
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
  {
    loop {
      let mut rx = match self.join_or_lead(&key) {
        Role::Leader(tx) => return self.lead(&key, tx, work).await,
        Role::Follower(rx) => rx,
      };

      if let Ok(done) = rx.wait_for(Option::is_some).await {
        if let Some(value) = (*done).clone() {
          return value;
        }
      }
      // Leader vanished without a result; contend again.
    }
  }

  fn join_or_lead(&self, key: &K) -> Role<T> {
    let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(rx) = inflight.get(key) {
      return Role::Follower(rx.clone());
    }
    let (tx, rx) = watch::channel(None);
    inflight.insert(key.clone(), rx);
    Role::Leader(tx)
  }

  async fn lead<F, Fut>(&self, key: &K, tx: watch::Sender<Option<T>>, work: F) -> T
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
  {
    let entry = FlightEntry { flights: self, key };
    let value = work().await;

    // Unregister before publishing: later callers start a fresh call, while
    // callers already waiting receive this one's result.
    drop(entry);
    tx.send_replace(Some(value.clone()));
    value
  }
}

/// Removes the in-flight entry when the leader finishes or is dropped.
struct FlightEntry<'a, K: Eq + Hash, T> {
  flights: &'a SingleFlight<K, T>,
  key:     &'a K,
}

impl<K: Eq + Hash, T> Drop for FlightEntry<'_, K, T> {
  fn drop(&mut self) {
    self
      .flights
      .inflight
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(self.key);
  }
}
