//! # Multi-instance tracker for concurrently in-flight requests.
//!
//! The status sequence holds a single slot per action type, so it cannot by
//! itself tell two concurrent dispatches of the same kind apart.
//! [`ActionStatusTracker`] disambiguates them by recording the uuids
//! currently in flight per kind.
//!
//! ```text
//! dispatch FETCH (u1) ──► track ──► { FETCH: [u1] }
//! dispatch FETCH (u2) ──► track ──► { FETCH: [u1, u2] }
//! u1 resolves         ──► untrack(status for u1) ──► { FETCH: [u2] }
//! u2 resolves         ──► untrack(status for u2) ──► { }
//! ```
//!
//! Entries have no automatic expiry: callers must untrack explicitly or the
//! entry leaks for the tracker's lifetime. Construct one tracker per
//! application context and pass it by reference; there is no process-wide
//! instance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

use crate::actions::Action;
use crate::state::AppState;
use crate::status::{ActionResult, ActionStatus};

/// Tracks in-flight request uuids per action kind.
///
/// Thread-safe and cloneable; clones share the same tracked state.
#[derive(Clone, Default)]
pub struct ActionStatusTracker {
    in_flight: Arc<Mutex<HashMap<String, Vec<Uuid>>>>,
}

impl ActionStatusTracker {
    /// Creates a new, empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `action`'s uuid under its kind.
    pub fn track<S>(&self, action: &Action<S>) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        in_flight
            .entry(action.kind().to_string())
            .or_default()
            .push(action.meta().uuid);
    }

    /// Stops tracking the uuid recorded in `action_status`.
    ///
    /// Returns whether the uuid was being tracked and was removed. The
    /// per-kind list is deleted entirely once it empties.
    pub fn untrack(&self, action_status: &ActionStatus) -> bool {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(ids) = in_flight.get_mut(&action_status.action_type) else {
            return false;
        };
        let before = ids.len();
        ids.retain(|uuid| *uuid != action_status.uuid);
        let removed = ids.len() < before;
        if ids.is_empty() {
            in_flight.remove(&action_status.action_type);
        }
        removed
    }

    /// True iff `action_type` has tracked uuids and at least one of them
    /// matches a pending status entry in `state`.
    pub fn is_status_pending<S: AppState>(&self, action_type: &str, state: &S) -> bool {
        let in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(ids) = in_flight.get(action_type) else {
            return false;
        };
        state
            .status()
            .iter()
            .any(|s| s.result == ActionResult::Pending && ids.contains(&s.uuid))
    }
}
