//! # Reducer delegate: folds service lifecycle actions into status entries.
//!
//! [`reducer_delegate`] is the piece of the reducer step the store installs
//! for a set of service-backed action kinds. It recognizes the reserved
//! response kinds ([`SUCCESS`], [`ERROR`], [`RESET_STATUS`]) whose related
//! action belongs to the tracked set, and request-originating actions of a
//! tracked kind, stamping the corresponding status transitions. Everything
//! else passes through unchanged.

use std::collections::HashSet;

use crate::actions::{Action, ERROR, RESET_STATUS, SUCCESS};
use crate::state::AppState;

use super::model::{
    error_status_data, reset_action_status, set_action_status, ActionResult,
};

/// Domain-specific reducer applied to [`SUCCESS`] actions before their
/// status is stamped.
pub type DelegateReducer<S> = dyn Fn(S, &Action<S>) -> S + Send + Sync;

/// Handles the common service lifecycle for the action kinds in `kinds`,
/// evaluated as an exclusive priority order:
///
/// 1. [`SUCCESS`] whose related kind is tracked: apply `delegate` (the
///    domain-specific state merge), then stamp a `Success` status for the
///    related action.
/// 2. [`ERROR`] whose related kind is tracked: stamp an `Error` status with
///    the failure payload under `data["error"]`; state otherwise unchanged.
/// 3. [`RESET_STATUS`] whose payload tracks a kind in the set: clear that
///    status entry.
/// 4. An action whose own kind is tracked (a request-originating action,
///    not a response): stamp a `Pending` status.
///
/// Any case not matched returns `state` unchanged.
pub fn reducer_delegate<S: AppState>(
    state: S,
    action: &Action<S>,
    kinds: &HashSet<String>,
    delegate: &DelegateReducer<S>,
) -> S {
    let related = action
        .meta()
        .related
        .as_ref()
        .filter(|r| kinds.contains(r.kind()));

    match action.kind() {
        SUCCESS => {
            if let Some(related) = related.cloned() {
                tracing::trace!(related = related.kind(), "handling SUCCESS action");
                let merged = delegate(state, action);
                return set_action_status(merged, &related, ActionResult::Success, None);
            }
        }
        ERROR => {
            if let Some(related) = related.cloned() {
                tracing::trace!(related = related.kind(), "handling ERROR action");
                let data = error_status_data(action);
                return set_action_status(state, &related, ActionResult::Error, Some(data));
            }
        }
        RESET_STATUS => {
            if let Some(payload) = action.payload().as_reset_status() {
                let action_type = payload.action_status.action_type.as_str();
                if kinds.contains(action_type) {
                    tracing::trace!(action_type, "resetting action status");
                    return reset_action_status(action_type, state);
                }
            }
        }
        kind if kinds.contains(kind) => {
            return set_action_status(state, action, ActionResult::Pending, None);
        }
        _ => {}
    }
    state
}
