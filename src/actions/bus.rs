//! # Action bus: the pub/sub surface the engines plug into.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] carrying
//! [`Action`] envelopes. It is the crate's view of the dispatch-bus
//! substrate: the store dispatches actions onto it, epics subscribe and
//! filter by kind, and epics publish their derived actions back onto it.
//!
//! ```text
//! Publishers (many):                     Subscribers (many):
//!   store.dispatch ──┐                 ┌──► reducer loop (folds into state)
//!   ServiceEpic ─────┼────► Bus ───────┼──► ServiceEpic (filter by kind)
//!   FanOutEpic ──────┘  (broadcast)    └──► FanOutEpic  (filter by kind)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks or suspends.
//! - **Submission order**: the channel delivers actions to every subscriber
//!   in the order they were published (the ordering substrate the engines
//!   rely on).
//! - **Bounded capacity, no backpressure**: a single ring buffer stores
//!   recent actions; a flood of dispatches overwrites the oldest entries and
//!   slow receivers observe a lag error. Nothing throttles publishers.
//! - **No persistence**: actions published with no live receivers are lost.

use tokio::sync::broadcast;

use crate::config::Config;

use super::action::Action;

/// Broadcast channel for dispatched actions.
///
/// Cheap to clone (internally holds an `Arc`-backed sender); clones publish
/// into and subscribe to the same stream.
#[derive(Clone, Debug)]
pub struct Bus<S> {
    tx: broadcast::Sender<Action<S>>,
}

impl<S: Clone + Send + 'static> Bus<S> {
    /// Creates a new bus with the capacity from `cfg` (clamped to at least 1).
    pub fn new(cfg: &Config) -> Self {
        let capacity = cfg.bus_capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Action<S>>(capacity);
        Self { tx }
    }

    /// Publishes an action to all active subscribers.
    ///
    /// If there are no receivers the action is dropped; this still returns
    /// immediately.
    pub fn publish(&self, action: Action<S>) {
        tracing::trace!(kind = action.kind(), uuid = %action.meta().uuid, "publishing action");
        let _ = self.tx.send(action);
    }

    /// Creates an independent receiver observing subsequent actions.
    ///
    /// A receiver only sees actions published **after** it subscribes; slow
    /// receivers observe `RecvError::Lagged(n)` and skip `n` oldest actions.
    pub fn subscribe(&self) -> broadcast::Receiver<Action<S>> {
        self.tx.subscribe()
    }
}
