//! Action envelopes and the broadcast bus they travel on.
//!
//! ## Contents
//! - [`Action`], [`Meta`], [`Payload`] — the immutable envelope model and
//!   its constructors ([`Action::new`], [`Action::follow_up`],
//!   [`Action::error`])
//! - [`SUCCESS`], [`ERROR`], [`NOOP`], [`RESET_STATUS`] — reserved kind tags
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`

mod action;
mod bus;

pub use action::{
    Action, ErrorPayload, Meta, Payload, ResetStatusPayload, StatusHook, ERROR, NOOP, RESET_STATUS,
    SUCCESS,
};
pub use bus::Bus;

pub(crate) use action::now_millis;
