//! # Single-handler dispatch engine.
//!
//! [`ServiceEpic`] binds one [`Service`] to one action kind. Each matching
//! action is dispatched on its own task: concurrent dispatches of the same
//! kind run independently, with no serialization between them and no
//! ordering guarantee across their results.
//!
//! ```text
//! Bus ──filter kind==T──► spawn ── service.call(action, state) ──┬─ Ok(next) ──► publish(next)
//!                                                                └─ Err/panic ─► publish(ERROR{related: action})
//! ```
//!
//! A handler failure (error return or panic) is contained and converted to
//! an `ERROR` action referencing the triggering action; it never propagates
//! to the subscription loop.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::actions::{Action, Bus};
use crate::error::EpicError;
use crate::state::{AppState, StateView};

use super::epic::{Epic, EpicRef};
use super::panic_message;
use super::service::ServiceRef;

/// Binds one asynchronous service to one action kind.
pub struct ServiceEpic<S: AppState> {
    kind: Arc<str>,
    service: ServiceRef<S>,
}

impl<S: AppState> ServiceEpic<S> {
    /// Creates an epic dispatching actions of `kind` to `service`.
    pub fn new(kind: impl Into<Arc<str>>, service: ServiceRef<S>) -> Self {
        Self {
            kind: kind.into(),
            service,
        }
    }

    /// Creates the epic and returns it as a shared handle.
    pub fn arc(kind: impl Into<Arc<str>>, service: ServiceRef<S>) -> EpicRef<S> {
        Arc::new(Self::new(kind, service))
    }
}

#[async_trait]
impl<S: AppState> Epic<S> for ServiceEpic<S> {
    fn name(&self) -> &str {
        &self.kind
    }

    async fn run(
        &self,
        bus: Bus<S>,
        state: StateView<S>,
        ctx: CancellationToken,
    ) -> Result<(), EpicError> {
        let mut rx = bus.subscribe();
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return Ok(()),
                recv = rx.recv() => match recv {
                    Ok(action) if action.kind() == &*self.kind => {
                        tracing::debug!(kind = action.kind(), uuid = %action.meta().uuid, "dispatching service");
                        let service = Arc::clone(&self.service);
                        let bus = bus.clone();
                        let state = state.clone();
                        tokio::spawn(dispatch(service, action, state, bus));
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        return Err(EpicError::Lagged { skipped });
                    }
                    Err(RecvError::Closed) => return Ok(()),
                },
            }
        }
    }
}

/// Runs one service invocation, containing failures and panics.
async fn dispatch<S: AppState>(
    service: ServiceRef<S>,
    action: Action<S>,
    state: StateView<S>,
    bus: Bus<S>,
) {
    let outcome = AssertUnwindSafe(service.call(action.clone(), state))
        .catch_unwind()
        .await;
    let next = match outcome {
        Ok(Ok(next)) => next,
        Ok(Err(err)) => Action::error(err, Some(Arc::new(action))),
        Err(panic) => Action::error(panic_message(panic), Some(Arc::new(action))),
    };
    bus.publish(next);
}
