//! # actionflow
//!
//! **actionflow** augments a pub/sub action-dispatch store with asynchronous
//! side-effect execution and per-action status tracking. It is a building
//! block for reactive client applications: the store (reducer + state tree)
//! lives outside this crate; actionflow supplies the action envelope model,
//! the side-effect engines, the status lifecycle, and the fault boundary
//! that keeps the whole subscription alive.
//!
//! ## Architecture
//! ```text
//!   store.dispatch(Action) ─────────────► Bus (broadcast channel)
//!                                          │
//!            ┌─────────────────────────────┼──────────────────────────┐
//!            ▼                             ▼                          ▼
//!   reducer loop (external)       ServiceEpic("LOAD")        FanOutEpic("SYNC")
//!   reducer_delegate folds        single handler per         named calls, started
//!   SUCCESS/ERROR/RESET_STATUS    action, concurrent         together, results
//!   into ActionStatus entries     dispatches                 emitted in order
//!            │                             │                          │
//!            ▼                             └────── publish(Action) ───┘
//!   watch::Sender<S> ──► StateView<S> snapshots for handlers
//!
//!   EpicSet supervises every epic: an uncaught failure is logged and the
//!   epic is resubscribed; failures surface only as ERROR actions and
//!   error-result status entries, never as process-level crashes.
//! ```
//!
//! ## Request lifecycle
//! ```text
//! Action::new("FETCH", payload)            status: FETCH → Pending
//!     │ ServiceEpic dispatches handler
//!     ├─ Ok  ──► Action::follow_up(a, SUCCESS, out)   status: FETCH → Success
//!     └─ Err ──► Action::error(err, a)                status: FETCH → Error
//! create_reset_status_action(status)       status entry removed
//! ```
//!
//! Concurrent requests of one kind share the single status slot; use an
//! [`ActionStatusTracker`] to tell their uuids apart.
//!
//! ## Example
//! ```no_run
//! use actionflow::{
//!     Action, ActionStatus, AppState, Bus, Config, EpicSet, Payload, ServiceEpic, ServiceFn,
//!     StateView, SUCCESS,
//! };
//! use serde_json::json;
//!
//! #[derive(Clone, Default)]
//! struct State {
//!     status: Vec<ActionStatus>,
//! }
//!
//! impl AppState for State {
//!     fn status(&self) -> &[ActionStatus] {
//!         &self.status
//!     }
//!     fn with_status(mut self, status: Vec<ActionStatus>) -> Self {
//!         self.status = status;
//!         self
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let bus: Bus<State> = Bus::new(&Config::default());
//!     let (_state_tx, state_rx) = tokio::sync::watch::channel(State::default());
//!
//!     let load = ServiceEpic::arc(
//!         "LOAD",
//!         ServiceFn::arc(|action: Action<State>, _state: StateView<State>| async move {
//!             // call a service, then continue the request
//!             Ok(Action::follow_up(action, SUCCESS, Payload::Value(json!({ "out": 10 }))))
//!         }),
//!     );
//!
//!     let handle = EpicSet::new()
//!         .with_epic(load)
//!         .spawn(bus.clone(), StateView::new(state_rx));
//!
//!     bus.publish(Action::new("LOAD", Payload::Value(json!({ "in": 5 }))));
//!     // ... run the application ...
//!     handle.shutdown().await;
//! }
//! ```

mod actions;
mod config;
mod error;
mod services;
mod state;
mod status;

// ---- Public re-exports ----

pub use actions::{
    Action, Bus, ErrorPayload, Meta, Payload, ResetStatusPayload, StatusHook, ERROR, NOOP,
    RESET_STATUS, SUCCESS,
};
pub use config::Config;
pub use error::{BoxError, CallError, CallSyncError, EpicError, EpicFailure};
pub use services::{
    CallSync, CompletionHandle, Epic, EpicErrorHandler, EpicRef, EpicSet, EpicSetHandle,
    FanOutEpic, FanOutFn, FanOutService, FanOutServiceRef, Service, ServiceEpic, ServiceFn,
    ServiceRef, SubscriptionEpic, SubscriptionFn, SubscriptionService, SubscriptionServiceRef,
    UpdateSink,
};
pub use state::{AppState, StateView};
pub use status::{
    create_reset_status_action, is_status_pending, last_status, reducer_delegate,
    reset_action_status, set_action_status, ActionResult, ActionStatus, ActionStatusTracker,
    DelegateReducer, StatusData,
};
