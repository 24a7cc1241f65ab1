//! # Fan-out dispatch engine with named, mutually-visible calls.
//!
//! [`FanOutEpic`] binds an ordered list of named handlers to one action
//! kind. On a matching action all handlers start concurrently, in
//! registration order; each receives a [`CallSync`] registry through which
//! it can await a sibling's eventual result, forming an implicit
//! per-invocation dependency edge.
//!
//! ```text
//! action ──► start call[0] ─┐            results emitted strictly in
//!            start call[1] ─┼─ all run   registration order:
//!            start call[2] ─┘  at once     publish r0, publish r1, publish r2
//! ```
//!
//! ## Emission ordering
//! Result actions are published strictly in registration order, not
//! completion order: call `i`'s result is held until call `i-1`'s has been
//! published, even when `i` finishes first. The work itself is never
//! throttled by this ordering.
//!
//! ## Batch failure — sharp edge
//! If any call fails, the whole batch aborts: a single `ERROR` action
//! referencing the triggering action is published and **no further results
//! are emitted, including results of calls that had already finished** but
//! were queued behind a not-yet-emitted predecessor. A late call's failure
//! silently discards completed sibling results. This mirrors the behavior
//! of sequencing concurrently-started work through an order-preserving
//! concatenation; rely on it deliberately, not accidentally.
//!
//! ## Cycles
//! Two calls awaiting each other deadlock; the registry only guards against
//! a call awaiting itself. Avoiding cross-call cycles is the caller's
//! responsibility.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::actions::{Action, Bus};
use crate::error::{BoxError, CallError, CallSyncError, EpicError};
use crate::state::{AppState, StateView};

use super::epic::{Epic, EpicRef};
use super::panic_message;

/// Awaitable handle to a named call's eventual resulting action.
///
/// Cloneable and shareable; a sibling failure resolves the handle to a
/// [`CallError`].
pub type CompletionHandle<S> = Shared<BoxFuture<'static, Result<Action<S>, CallError>>>;

/// Asynchronous handler participating in a fan-out batch.
#[async_trait]
pub trait FanOutService<S: AppState>: Send + Sync + 'static {
    /// Invoked once per matching action, concurrently with its siblings.
    ///
    /// `calls` resolves sibling names to completion handles; awaiting one
    /// suspends this call until the sibling completes.
    async fn call(
        &self,
        action: Action<S>,
        state: StateView<S>,
        calls: CallSync<S>,
    ) -> Result<Action<S>, BoxError>;
}

/// Shared handle to a fan-out service implementation.
pub type FanOutServiceRef<S> = Arc<dyn FanOutService<S>>;

/// Function-backed fan-out service.
pub struct FanOutFn<F> {
    f: F,
}

impl<F> FanOutFn<F> {
    /// Creates a new function-backed fan-out service.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the service and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<S, F, Fut> FanOutService<S> for FanOutFn<F>
where
    S: AppState,
    F: Fn(Action<S>, StateView<S>, CallSync<S>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Action<S>, BoxError>> + Send + 'static,
{
    async fn call(
        &self,
        action: Action<S>,
        state: StateView<S>,
        calls: CallSync<S>,
    ) -> Result<Action<S>, BoxError> {
        (self.f)(action, state, calls).await
    }
}

/// Read-only registry mapping call names to completion handles for one
/// fan-out invocation.
///
/// Each participating call holds its own view, which rejects lookups of the
/// call's own name (awaiting it could only deadlock).
pub struct CallSync<S: AppState> {
    caller: Arc<str>,
    handles: Arc<HashMap<Arc<str>, CompletionHandle<S>>>,
}

impl<S: AppState> Clone for CallSync<S> {
    fn clone(&self) -> Self {
        Self {
            caller: Arc::clone(&self.caller),
            handles: Arc::clone(&self.handles),
        }
    }
}

impl<S: AppState> CallSync<S> {
    /// Name of the call holding this view.
    pub fn caller(&self) -> &str {
        &self.caller
    }

    /// Returns the completion handle of the named sibling call.
    ///
    /// Fails on a lookup of the caller's own name or of a name not
    /// registered with the epic.
    pub fn result_of(&self, name: &str) -> Result<CompletionHandle<S>, CallSyncError> {
        if *self.caller == *name {
            return Err(CallSyncError::SelfReference {
                caller: Arc::clone(&self.caller),
            });
        }
        self.handles
            .get(name)
            .cloned()
            .ok_or_else(|| CallSyncError::UnknownCall {
                name: Arc::from(name),
            })
    }
}

/// Binds N named services to one action kind, executed as ordered batches.
pub struct FanOutEpic<S: AppState> {
    kind: Arc<str>,
    // declaration order supplied by the caller; this order is the emission
    // order, so an explicit list rather than a keyed map
    calls: Vec<(Arc<str>, FanOutServiceRef<S>)>,
}

impl<S: AppState> FanOutEpic<S> {
    /// Creates an empty fan-out epic for actions of `kind`.
    pub fn new(kind: impl Into<Arc<str>>) -> Self {
        Self {
            kind: kind.into(),
            calls: Vec::new(),
        }
    }

    /// Registers a named call; registration order is emission order.
    ///
    /// Re-registering an existing name replaces the service but keeps the
    /// name's original position.
    pub fn with_call(mut self, name: impl Into<Arc<str>>, service: FanOutServiceRef<S>) -> Self {
        let name = name.into();
        match self.calls.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = service,
            None => self.calls.push((name, service)),
        }
        self
    }

    /// Wraps the epic in a shared handle.
    pub fn arc(self) -> EpicRef<S> {
        Arc::new(self)
    }
}

#[async_trait]
impl<S: AppState> Epic<S> for FanOutEpic<S> {
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
                        tracing::debug!(
                            kind = action.kind(),
                            uuid = %action.meta().uuid,
                            calls = self.calls.len(),
                            "dispatching fan-out batch"
                        );
                        let calls = self.calls.clone();
                        let bus = bus.clone();
                        let state = state.clone();
                        tokio::spawn(run_batch(calls, action, state, bus));
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

/// Runs one fan-out batch: starts every call, then emits results in
/// registration order until all are published or the first failure aborts
/// the batch.
///
/// The failure watch runs alongside the ordered emission: a call that fails
/// while an earlier call is still holding up the queue aborts the batch
/// immediately, discarding results that finished but were never emitted.
async fn run_batch<S: AppState>(
    calls: Vec<(Arc<str>, FanOutServiceRef<S>)>,
    action: Action<S>,
    state: StateView<S>,
    bus: Bus<S>,
) {
    if calls.is_empty() {
        return;
    }

    // completion handles for every name exist before any call starts, so a
    // call can await any sibling regardless of registration order
    let mut handles = HashMap::with_capacity(calls.len());
    let mut resolvers = Vec::with_capacity(calls.len());
    let mut queue = Vec::with_capacity(calls.len());
    for (name, _) in &calls {
        let (tx, rx) = oneshot::channel::<Result<Action<S>, CallError>>();
        let err_name = Arc::clone(name);
        let handle: CompletionHandle<S> = rx
            .map(move |recv| match recv {
                Ok(result) => result,
                Err(_) => Err(CallError {
                    call: err_name,
                    message: Arc::from("call aborted before completion"),
                }),
            })
            .boxed()
            .shared();
        handles.insert(Arc::clone(name), handle.clone());
        resolvers.push(tx);
        queue.push((Arc::clone(name), handle));
    }
    let handles = Arc::new(handles);

    // start all calls concurrently, in registration order
    for ((name, service), resolver) in calls.into_iter().zip(resolvers) {
        let sync = CallSync {
            caller: Arc::clone(&name),
            handles: Arc::clone(&handles),
        };
        let task_name = name;
        let task_action = action.clone();
        let task_state = state.clone();
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(service.call(task_action, task_state, sync))
                .catch_unwind()
                .await;
            let result: Result<Action<S>, CallError> = match outcome {
                Ok(Ok(next)) => Ok(next),
                Ok(Err(err)) => Err(CallError {
                    call: Arc::clone(&task_name),
                    message: Arc::from(err.to_string()),
                }),
                Err(panic) => Err(CallError {
                    call: Arc::clone(&task_name),
                    message: Arc::from(panic_message(panic)),
                }),
            };
            let _ = resolver.send(result);
        });
    }

    // resolves with the first failure anywhere in the batch
    let failure_watches: Vec<_> = queue
        .iter()
        .map(|(_, handle)| {
            let handle = handle.clone();
            async move {
                match handle.await {
                    Err(err) => err,
                    Ok(_) => futures::future::pending::<CallError>().await,
                }
            }
            .boxed()
        })
        .collect();
    let mut first_failure = futures::future::select_all(failure_watches).map(|(err, _, _)| err);

    // ordered emission; any failure aborts the whole batch
    for (name, handle) in queue {
        tokio::select! {
            biased;
            err = &mut first_failure => {
                tracing::debug!(call = %err.call, error = %err, "fan-out batch aborted");
                bus.publish(Action::error(err, Some(Arc::new(action.clone()))));
                return;
            }
            result = handle => match result {
                Ok(next) => bus.publish(next),
                Err(err) => {
                    tracing::debug!(call = %name, error = %err, "fan-out batch aborted");
                    bus.publish(Action::error(err, Some(Arc::new(action.clone()))));
                    return;
                }
            },
        }
    }
}
