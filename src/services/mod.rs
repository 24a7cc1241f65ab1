//! Side-effect dispatch engines ("epics") and their supervision.
//!
//! ## Contents
//! - [`Service`], [`ServiceFn`] — asynchronous handler bound to one kind
//! - [`ServiceEpic`] — single-handler engine
//! - [`FanOutService`], [`FanOutEpic`], [`CallSync`] — fan-out engine with
//!   named, mutually-visible calls
//! - [`SubscriptionService`], [`SubscriptionEpic`], [`UpdateSink`] —
//!   streaming-update engine
//! - [`EpicSet`] — combined subscription with resubscribe-on-failure
//!
//! ## Concurrency model
//! All engines run on the async runtime's cooperative scheduler. Dispatches
//! are independent tasks: nothing serializes two invocations of the same
//! handler, there is no cancellation of in-flight handlers, and there is no
//! backpressure — a flood of dispatches produces an unbounded number of
//! concurrent handler tasks. Bounding inflow is the dispatching side's
//! responsibility.

mod epic;
mod fan_out;
mod service;
mod set;
mod single;
mod subscription;

pub use epic::{Epic, EpicRef};
pub use fan_out::{
    CallSync, CompletionHandle, FanOutEpic, FanOutFn, FanOutService, FanOutServiceRef,
};
pub use service::{Service, ServiceFn, ServiceRef};
pub use set::{EpicErrorHandler, EpicSet, EpicSetHandle};
pub use single::ServiceEpic;
pub use subscription::{
    SubscriptionEpic, SubscriptionFn, SubscriptionService, SubscriptionServiceRef, UpdateSink,
};

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
