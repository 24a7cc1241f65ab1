//! # Subscription dispatch engine: streaming updates plus a final result.
//!
//! [`SubscriptionEpic`] is a single-handler variant for long-lived service
//! calls that produce incremental results: the handler receives an
//! [`UpdateSink`] through which it publishes update actions onto the stream
//! while it runs, before returning its final follow-up action.
//!
//! Failure semantics match the single-handler engine: an error return or a
//! panic becomes a single `ERROR` action referencing the triggering action.
//! Errors observed *within* a live subscription (for example a dropped
//! connection after successful setup) are reported through
//! [`UpdateSink::error`] without terminating anything.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::actions::{Action, Bus};
use crate::error::{BoxError, EpicError};
use crate::state::{AppState, StateView};

use super::epic::{Epic, EpicRef};
use super::panic_message;

/// Publisher handed to a subscription handler for incremental results.
///
/// Cloneable; a handler may move clones into callbacks that outlive its own
/// invocation.
pub struct UpdateSink<S: AppState> {
    bus: Bus<S>,
    related: Arc<Action<S>>,
}

impl<S: AppState> Clone for UpdateSink<S> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            related: Arc::clone(&self.related),
        }
    }
}

impl<S: AppState> UpdateSink<S> {
    /// Publishes an incremental update action onto the stream.
    pub fn update(&self, action: Action<S>) {
        self.bus.publish(action);
    }

    /// Publishes an `ERROR` action referencing the subscription's
    /// triggering action.
    pub fn error(&self, err: impl Into<BoxError>) {
        self.bus
            .publish(Action::error(err, Some(Arc::clone(&self.related))));
    }

    /// The action that opened this subscription.
    pub fn related(&self) -> &Action<S> {
        &self.related
    }
}

/// Asynchronous handler for a subscription-style service call.
#[async_trait]
pub trait SubscriptionService<S: AppState>: Send + Sync + 'static {
    /// Invoked once per matching action; publishes incremental updates via
    /// `updates` and returns the final follow-up action.
    async fn call(
        &self,
        action: Action<S>,
        state: StateView<S>,
        updates: UpdateSink<S>,
    ) -> Result<Action<S>, BoxError>;
}

/// Shared handle to a subscription service implementation.
pub type SubscriptionServiceRef<S> = Arc<dyn SubscriptionService<S>>;

/// Function-backed subscription service.
pub struct SubscriptionFn<F> {
    f: F,
}

impl<F> SubscriptionFn<F> {
    /// Creates a new function-backed subscription service.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the service and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<S, F, Fut> SubscriptionService<S> for SubscriptionFn<F>
where
    S: AppState,
    F: Fn(Action<S>, StateView<S>, UpdateSink<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Action<S>, BoxError>> + Send + 'static,
{
    async fn call(
        &self,
        action: Action<S>,
        state: StateView<S>,
        updates: UpdateSink<S>,
    ) -> Result<Action<S>, BoxError> {
        (self.f)(action, state, updates).await
    }
}

/// Binds one subscription service to one action kind.
pub struct SubscriptionEpic<S: AppState> {
    kind: Arc<str>,
    service: SubscriptionServiceRef<S>,
}

impl<S: AppState> SubscriptionEpic<S> {
    /// Creates an epic dispatching actions of `kind` to `service`.
    pub fn new(kind: impl Into<Arc<str>>, service: SubscriptionServiceRef<S>) -> Self {
        Self {
            kind: kind.into(),
            service,
        }
    }

    /// Creates the epic and returns it as a shared handle.
    pub fn arc(kind: impl Into<Arc<str>>, service: SubscriptionServiceRef<S>) -> EpicRef<S> {
        Arc::new(Self::new(kind, service))
    }
}

#[async_trait]
impl<S: AppState> Epic<S> for SubscriptionEpic<S> {
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
                        tracing::debug!(kind = action.kind(), uuid = %action.meta().uuid, "opening subscription");
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

async fn dispatch<S: AppState>(
    service: SubscriptionServiceRef<S>,
    action: Action<S>,
    state: StateView<S>,
    bus: Bus<S>,
) {
    let related = Arc::new(action.clone());
    let sink = UpdateSink {
        bus: bus.clone(),
        related: Arc::clone(&related),
    };
    let outcome = AssertUnwindSafe(service.call(action, state, sink))
        .catch_unwind()
        .await;
    let next = match outcome {
        Ok(Ok(next)) => next,
        Ok(Err(err)) => Action::error(err, Some(related)),
        Err(panic) => Action::error(panic_message(panic), Some(related)),
    };
    bus.publish(next);
}
