//! # Epic set: combined subscription with a resilience boundary.
//!
//! [`EpicSet`] combines multiple epics into one supervised runtime and is
//! the sole top-level fault boundary: an uncaught failure escaping an epic
//! (an error from its run loop, or a panic) is logged, reported to an
//! optional error handler, and answered by **resubscribing the epic to the
//! same bus** rather than letting the subscription die. The stream keeps
//! accepting and processing new actions indefinitely; nothing below this
//! boundary is fatal to the process.
//!
//! ```text
//! EpicSet::spawn(bus, state)
//!   ├─► supervise(epic 1) ──► epic.run(bus, state, ctx) ──┐
//!   ├─► supervise(epic 2) ──► ...                         │ Err / panic
//!   └─► supervise(epic N)                                 ▼
//!                                  log + error_handler(failure, epic name)
//!                                  loop: run again (fresh subscription)
//! ```
//!
//! Shutdown is cooperative: [`EpicSetHandle::shutdown`] cancels the shared
//! token and joins the supervisors. In-flight handler tasks are not
//! cancelled; they run to completion or failure.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::actions::Bus;
use crate::error::EpicFailure;
use crate::state::{AppState, StateView};

use super::epic::EpicRef;
use super::panic_message;

/// Callback invoked with each uncaught epic failure and the epic's name.
pub type EpicErrorHandler = Arc<dyn Fn(&EpicFailure, &str) + Send + Sync>;

/// Combines epics into one supervised subscription.
pub struct EpicSet<S: AppState> {
    epics: Vec<EpicRef<S>>,
    on_error: Option<EpicErrorHandler>,
}

impl<S: AppState> Default for EpicSet<S> {
    fn default() -> Self {
        Self {
            epics: Vec::new(),
            on_error: None,
        }
    }
}

impl<S: AppState> EpicSet<S> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an epic to the set.
    pub fn with_epic(mut self, epic: EpicRef<S>) -> Self {
        self.epics.push(epic);
        self
    }

    /// Adds several epics to the set.
    pub fn with_epics(mut self, epics: impl IntoIterator<Item = EpicRef<S>>) -> Self {
        self.epics.extend(epics);
        self
    }

    /// Registers a callback observing uncaught epic failures.
    ///
    /// The handler runs on the supervising task after the failure is logged
    /// and before the epic is resubscribed.
    pub fn with_error_handler(
        mut self,
        handler: impl Fn(&EpicFailure, &str) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Spawns one supervising task per epic and returns a handle for
    /// shutdown.
    pub fn spawn(self, bus: Bus<S>, state: StateView<S>) -> EpicSetHandle {
        let EpicSet { epics, on_error } = self;
        let ctx = CancellationToken::new();
        let supervisors = epics
            .into_iter()
            .map(|epic| {
                let bus = bus.clone();
                let state = state.clone();
                let ctx = ctx.clone();
                let on_error = on_error.clone();
                tokio::spawn(supervise(epic, bus, state, ctx, on_error))
            })
            .collect();
        EpicSetHandle { ctx, supervisors }
    }
}

/// Runs one epic in a resubscribe-on-failure loop.
async fn supervise<S: AppState>(
    epic: EpicRef<S>,
    bus: Bus<S>,
    state: StateView<S>,
    ctx: CancellationToken,
    on_error: Option<EpicErrorHandler>,
) {
    loop {
        let run = epic.run(bus.clone(), state.clone(), ctx.clone());
        let failure = match AssertUnwindSafe(run).catch_unwind().await {
            // orderly end: cancelled or the bus was dropped
            Ok(Ok(())) => return,
            Ok(Err(err)) => EpicFailure::Failed(err),
            Err(panic) => EpicFailure::Panicked {
                info: panic_message(panic),
            },
        };
        tracing::error!(
            epic = epic.name(),
            error = %failure,
            label = failure.as_label(),
            "resubscribing epic after uncaught failure"
        );
        if let Some(handler) = &on_error {
            handler(&failure, epic.name());
        }
        if ctx.is_cancelled() {
            return;
        }
        // next iteration resubscribes with a fresh receiver
    }
}

/// Handle to a running epic set.
pub struct EpicSetHandle {
    ctx: CancellationToken,
    supervisors: Vec<JoinHandle<()>>,
}

impl EpicSetHandle {
    /// Token cancelled when shutdown is requested; epics observe it through
    /// the `ctx` argument of their run loop.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.ctx.clone()
    }

    /// Requests cooperative shutdown and joins all supervising tasks.
    pub async fn shutdown(self) {
        self.ctx.cancel();
        for supervisor in self.supervisors {
            let _ = supervisor.await;
        }
    }
}
