//! # Epic trait: a side-effect engine subscribed to the action stream.
//!
//! An [`Epic`] owns one subscription to the [`Bus`] for its lifetime: it
//! filters the stream, runs handlers, and publishes derived actions. Epics
//! are combined and supervised by an [`EpicSet`](crate::EpicSet), which
//! restarts a failed epic with a fresh subscription.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::actions::Bus;
use crate::error::EpicError;
use crate::state::{AppState, StateView};

/// Side-effect dispatch engine bound to the action stream.
#[async_trait]
pub trait Epic<S: AppState>: Send + Sync + 'static {
    /// Stable, human-readable name (for logs and the error handler).
    fn name(&self) -> &str;

    /// Subscribes to `bus` and processes matching actions until the stream
    /// closes or `ctx` is cancelled.
    ///
    /// Returning `Err` (or panicking) hands control to the supervising
    /// [`EpicSet`](crate::EpicSet), which resubscribes this epic. In-flight
    /// handler tasks are not cancelled; once started, a handler runs to
    /// completion or failure.
    async fn run(
        &self,
        bus: Bus<S>,
        state: StateView<S>,
        ctx: CancellationToken,
    ) -> Result<(), EpicError>;
}

/// Shared handle to an epic.
pub type EpicRef<S> = std::sync::Arc<dyn Epic<S>>;
