//! # Side-effect service abstraction and function-backed implementation.
//!
//! A [`Service`] is an asynchronous handler bound to one action kind by a
//! [`ServiceEpic`](crate::ServiceEpic). It receives the triggering action
//! and a read-only view of the current state, and produces the follow-up
//! action to publish.
//!
//! Failures are reported as [`BoxError`]; the engine converts them into
//! `ERROR` actions, so a failing service never crashes its caller.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::actions::Action;
use crate::error::BoxError;
use crate::state::{AppState, StateView};

/// Asynchronous handler bound to one action kind.
#[async_trait]
pub trait Service<S: AppState>: Send + Sync + 'static {
    /// Invoked once per matching action; may suspend freely.
    ///
    /// Returns the action to publish back onto the stream, or an error to
    /// be converted into an `ERROR` action referencing `action`.
    async fn call(&self, action: Action<S>, state: StateView<S>) -> Result<Action<S>, BoxError>;
}

/// Shared handle to a service implementation.
pub type ServiceRef<S> = Arc<dyn Service<S>>;

/// Function-backed service implementation.
///
/// Wraps a closure that creates a fresh future per dispatch, so concurrent
/// dispatches never share mutable state implicitly.
pub struct ServiceFn<F> {
    f: F,
}

impl<F> ServiceFn<F> {
    /// Creates a new function-backed service.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the service and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<S, F, Fut> Service<S> for ServiceFn<F>
where
    S: AppState,
    F: Fn(Action<S>, StateView<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Action<S>, BoxError>> + Send + 'static,
{
    async fn call(&self, action: Action<S>, state: StateView<S>) -> Result<Action<S>, BoxError> {
        (self.f)(action, state).await
    }
}
