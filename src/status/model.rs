//! # Per-action-type status lifecycle.
//!
//! Every tracked action type has at most one [`ActionStatus`] entry in the
//! application state's status sequence; identity is the `action_type` field.
//! The lifecycle:
//!
//! ```text
//! dispatch of tracked kind ──► Pending
//! SUCCESS with matching related ──► Success
//! ERROR   with matching related ──► Error   (failure details in `data`)
//! RESET_STATUS for the kind     ──► entry removed
//! ```
//!
//! All mutation functions are copy-on-write: they consume the state and
//! return a new value with the status sequence updated.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::actions::{now_millis, Action, Payload, ResetStatusPayload, RESET_STATUS};
use crate::state::AppState;

/// Transient data recorded with a status entry.
///
/// Lives in state only until the status for that action type is replaced or
/// reset.
pub type StatusData = std::collections::HashMap<String, Value>;

/// Result classification of the last recorded action execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionResult {
    /// No result recorded.
    #[default]
    None,
    /// A tracked action was dispatched and is awaiting its outcome.
    Pending,
    /// The request completed successfully.
    Success,
    /// Informational outcome.
    Info,
    /// Completed with a warning.
    Warn,
    /// The request failed.
    Error,
}

/// Status and/or result of an action execution, recorded in state.
#[derive(Clone, Debug, Serialize)]
pub struct ActionStatus {
    /// The action kind this status tracks (identity within the sequence).
    pub action_type: String,
    /// Latest recorded result.
    pub result: ActionResult,
    /// Uuid of the logical request that produced this status.
    pub uuid: Uuid,
    /// Recording time, epoch milliseconds.
    pub timestamp: u64,
    /// Transient execution data.
    pub data: StatusData,
}

/// Records a status for `action` in `state` and returns the updated state.
///
/// Builds an [`ActionStatus`] stamped with the action's kind and uuid, then
/// invokes the related action's status hook (if any) followed by the
/// action's own hook, passing the pre-update state. Hooks are synchronous
/// observers; they must not mutate state.
///
/// The returned state's status sequence holds at most one entry per action
/// type: an existing entry for the same kind is replaced, otherwise the new
/// entry is appended.
pub fn set_action_status<S: AppState>(
    state: S,
    action: &Action<S>,
    result: ActionResult,
    data: Option<StatusData>,
) -> S {
    let status = ActionStatus {
        action_type: action.kind().to_string(),
        result,
        uuid: action.meta().uuid,
        timestamp: now_millis(),
        data: data.unwrap_or_default(),
    };
    tracing::trace!(
        action_type = %status.action_type,
        result = ?status.result,
        uuid = %status.uuid,
        "recording action status"
    );

    if let Some(related) = &action.meta().related {
        if let Some(hook) = &related.meta().status_hook {
            hook.on_status(&status, action, &state);
        }
    }
    if let Some(hook) = &action.meta().status_hook {
        hook.on_status(&status, action, &state);
    }

    let mut updated: Vec<ActionStatus> = state
        .status()
        .iter()
        .filter(|s| s.action_type != status.action_type)
        .cloned()
        .collect();
    updated.push(status);
    state.with_status(updated)
}

/// Removes the status entry for `action_type`, if any, and returns the
/// updated state.
pub fn reset_action_status<S: AppState>(action_type: &str, state: S) -> S {
    let updated: Vec<ActionStatus> = state
        .status()
        .iter()
        .filter(|s| s.action_type != action_type)
        .cloned()
        .collect();
    state.with_status(updated)
}

/// True iff a status entry with result [`ActionResult::Pending`] matches one
/// of `action_types`, or any pending entry at all when `action_types` is
/// empty.
pub fn is_status_pending<S: AppState>(state: &S, action_types: &[&str]) -> bool {
    state.status().iter().any(|s| {
        s.result == ActionResult::Pending
            && (action_types.is_empty() || action_types.contains(&s.action_type.as_str()))
    })
}

/// The status entry with the greatest timestamp, or `None` when the status
/// sequence is empty. Ties resolve to the later entry in the sequence.
pub fn last_status<S: AppState>(state: &S) -> Option<&ActionStatus> {
    state.status().iter().fold(None, |last, status| match last {
        Some(prev) if status.timestamp < prev.timestamp => Some(prev),
        _ => Some(status),
    })
}

/// Creates a [`RESET_STATUS`] action that clears the status entry recorded
/// for `action_status`'s action type.
pub fn create_reset_status_action<S>(action_status: ActionStatus) -> Action<S> {
    Action::new(
        Arc::from(RESET_STATUS),
        Payload::ResetStatus(ResetStatusPayload { action_status }),
    )
}

/// Renders an action's payload into the `data` map recorded with an error
/// status.
pub(crate) fn error_status_data<S>(action: &Action<S>) -> StatusData {
    let rendered = match action.payload() {
        Payload::Error(e) => json!({
            "err": e.err.to_string(),
            "message": e.message,
            "data": e.data,
        }),
        Payload::Value(v) => v.clone(),
        _ => Value::Null,
    };
    let mut data = StatusData::new();
    data.insert("error".to_string(), rendered);
    data
}
