//! # Application state contract and read-only snapshots.
//!
//! The store that owns the state tree lives outside this crate; the dispatch
//! engines only require two things from it:
//!
//! - the state type implements [`AppState`], exposing the ordered status
//!   sequence and a copy-on-write update of it, and
//! - handlers can observe the *current* state through a [`StateView`], a
//!   cheap clone of a `tokio::sync::watch` receiver fed by the store's
//!   single writer (the reducer step).
//!
//! Concurrent handler tasks never write state directly; they influence it
//! only by emitting actions for the reducer to fold in.

use tokio::sync::watch;

use crate::status::ActionStatus;

/// Contract the external state tree must satisfy for status tracking.
///
/// All status mutations are copy-on-write: [`AppState::with_status`] returns
/// a new state value, never mutates in place. The status sequence holds at
/// most one entry per action type (enforced by
/// [`set_action_status`](crate::set_action_status), not by implementors).
pub trait AppState: Clone + Send + Sync + 'static {
    /// The ordered sequence of recorded action statuses.
    fn status(&self) -> &[ActionStatus];

    /// Returns a copy of this state with the status sequence replaced.
    fn with_status(self, status: Vec<ActionStatus>) -> Self;
}

/// Read-only view of the store's current state, handed to handlers.
///
/// Backed by a `watch` channel: the store publishes each reduced state, and
/// [`StateView::get`] returns a clone of the most recent one. Many handler
/// tasks may hold views concurrently; none of them can write through it.
#[derive(Clone, Debug)]
pub struct StateView<S> {
    rx: watch::Receiver<S>,
}

impl<S: Clone> StateView<S> {
    /// Wraps a `watch` receiver fed by the store's reducer loop.
    pub fn new(rx: watch::Receiver<S>) -> Self {
        Self { rx }
    }

    /// Returns a snapshot (clone) of the current state.
    pub fn get(&self) -> S {
        self.rx.borrow().clone()
    }

    /// Runs `f` against the current state without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.rx.borrow())
    }
}
