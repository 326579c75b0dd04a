//! Keyed single-flight guard.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

/// Admits at most one outstanding operation per key.
///
/// [`SingleFlight::try_acquire`] hands out a [`FlightGuard`]; the key stays
/// claimed until the guard is dropped, whether the operation succeeded,
/// failed, or was cancelled.
#[derive(Debug)]
pub struct SingleFlight<K> {
    in_flight: Arc<Mutex<HashSet<K>>>,
}

impl<K> Default for SingleFlight<K> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl<K: Eq + Hash + Clone> SingleFlight<K> {
    /// Creates an empty guard set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key`, or returns `None` if it is already claimed.
    #[must_use]
    pub fn try_acquire(&self, key: K) -> Option<FlightGuard<K>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(key.clone()) {
            return None;
        }
        Some(FlightGuard {
            key,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Returns `true` if `key` is currently claimed.
    #[must_use]
    pub fn is_in_flight(&self, key: &K) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

/// Releases its key when dropped.
#[derive(Debug)]
pub struct FlightGuard<K: Eq + Hash> {
    key: K,
    in_flight: Arc<Mutex<HashSet<K>>>,
}

impl<K: Eq + Hash> Drop for FlightGuard<K> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
