//! Per-action-type status lifecycle, the reducer delegate, and the
//! multi-instance tracker.
//!
//! ## Contents
//! - [`ActionStatus`], [`ActionResult`] — the status record and its result
//!   classification
//! - [`set_action_status`], [`reset_action_status`], [`is_status_pending`],
//!   [`last_status`], [`create_reset_status_action`] — copy-on-write state
//!   mutation helpers
//! - [`reducer_delegate`] — the common service-lifecycle reducer installed
//!   into the store for a set of tracked kinds
//! - [`ActionStatusTracker`] — uuid-level tracking of concurrently in-flight
//!   instances of one kind

mod model;
mod reducer;
mod tracker;

pub use model::{
    create_reset_status_action, is_status_pending, last_status, reset_action_status,
    set_action_status, ActionResult, ActionStatus, StatusData,
};
pub use reducer::{reducer_delegate, DelegateReducer};
pub use tracker::ActionStatusTracker;
