//! Error types used by the dispatch engines and the resilience boundary.
//!
//! Three layers of failure exist in this crate:
//!
//! - **Handler failures** are application-level: a service returns an error
//!   (or panics). These never surface as `Err` values; the engines convert
//!   them into `ERROR` actions on the stream. Handlers report failures as
//!   [`BoxError`].
//! - **Fan-out call failures** propagate between sibling handlers through
//!   completion handles as [`CallError`] (cloneable, message-only). Lookup
//!   misuse of the call registry is a [`CallSyncError`].
//! - **Stream-level failures** ([`EpicError`], or a panic escaping an epic)
//!   are caught once at the [`EpicSet`](crate::EpicSet) boundary, reported as
//!   [`EpicFailure`], and answered by resubscribing the epic.

use std::sync::Arc;

use thiserror::Error;

/// Boxed application error produced by side-effect handlers.
///
/// Services may fail with any error type; the engines only need `Display`
/// to render it into an `ERROR` action payload.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced by a running epic's subscription loop.
///
/// Returned from [`Epic::run`](crate::Epic::run); the [`EpicSet`](crate::EpicSet)
/// supervisor logs these and resubscribes with a fresh receiver.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EpicError {
    /// The epic's receiver fell behind the bus ring buffer and skipped actions.
    ///
    /// Resubscribing yields a fresh receiver positioned at the stream head;
    /// the skipped actions are lost (the bus has no persistence).
    #[error("action stream lagged, {skipped} actions skipped")]
    Lagged {
        /// Number of actions dropped for this receiver.
        skipped: u64,
    },
}

impl EpicError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EpicError::Lagged { .. } => "epic_lagged",
        }
    }
}

/// # Uncaught failure escaping an epic, observed at the resilience boundary.
///
/// Passed to the error handler registered via
/// [`EpicSet::with_error_handler`](crate::EpicSet::with_error_handler).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EpicFailure {
    /// The epic's run loop returned an error.
    #[error("epic failed: {0}")]
    Failed(#[from] EpicError),

    /// A panic escaped the epic's run loop.
    #[error("epic panicked: {info}")]
    Panicked {
        /// Extracted panic message, or `"unknown panic"`.
        info: String,
    },
}

impl EpicFailure {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EpicFailure::Failed(e) => e.as_label(),
            EpicFailure::Panicked { .. } => "epic_panicked",
        }
    }
}

/// Failure of a named fan-out call, as seen by its sibling handlers.
///
/// Completion handles must be cloneable, so this carries only the call name
/// and a rendered message; the originating error itself travels in the
/// batch-level `ERROR` action.
#[derive(Error, Debug, Clone)]
#[error("fan-out call '{call}' failed: {message}")]
pub struct CallError {
    /// Name of the call that failed.
    pub call: Arc<str>,
    /// Rendered failure message.
    pub message: Arc<str>,
}

/// # Misuse of the fan-out call registry.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CallSyncError {
    /// A handler looked up its own completion handle, which can only deadlock.
    #[error("fan-out call '{caller}' awaited its own result")]
    SelfReference {
        /// Name of the offending call.
        caller: Arc<str>,
    },

    /// The requested name is not registered with this fan-out epic.
    #[error("unknown fan-out call '{name}'")]
    UnknownCall {
        /// The name that was looked up.
        name: Arc<str>,
    },
}
