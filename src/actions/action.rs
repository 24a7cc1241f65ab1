//! # Action envelope: immutable messages on the dispatch stream.
//!
//! An [`Action`] describes an intent (a request-originating action) or a
//! result (a follow-up or error action). Envelopes are immutable once built
//! and cheap to clone: the kind tag, intent tag, related action and status
//! hook are all shared references.
//!
//! ## Identity
//! The `uuid` on [`Meta`] identifies one *logical request* across its whole
//! chain of actions:
//! - [`Action::new`] generates a fresh uuid,
//! - [`Action::follow_up`] inherits the related action's uuid (same request,
//!   new step),
//! - [`Action::error`] inherits the related action's uuid when one is given,
//!   otherwise generates a fresh one.
//!
//! ## Back-reference chains
//! `meta.related` chains are acyclic by construction: each follow-up points
//! strictly to its predecessor, so walking `related` links always terminates
//! at the originating action.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use uuid::Uuid;

use crate::error::BoxError;
use crate::status::ActionStatus;

/// Reserved kind for a successful service result.
pub const SUCCESS: &str = "SUCCESS";
/// Reserved kind for a failed service result.
pub const ERROR: &str = "ERROR";
/// Reserved kind for an action that carries no effect.
pub const NOOP: &str = "NOOP";
/// Reserved kind for clearing a recorded action status.
pub const RESET_STATUS: &str = "RESET_STATUS";

/// Current wall-clock time as epoch milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}

/// Synchronous observer invoked whenever a status is recorded for the action
/// carrying it, or for one of that action's continuations.
///
/// Hooks are side-effecting observers only: they must not mutate state and
/// must not panic (a panicking hook is a caller contract violation and is
/// not contained by this crate).
pub trait StatusHook<S>: Send + Sync {
    /// Called with the freshly built status, the action that caused it, and
    /// the state the status is being recorded against (pre-update).
    fn on_status(&self, status: &ActionStatus, action: &Action<S>, state: &S);
}

impl<S, F> StatusHook<S> for F
where
    F: Fn(&ActionStatus, &Action<S>, &S) + Send + Sync,
{
    fn on_status(&self, status: &ActionStatus, action: &Action<S>, state: &S) {
        self(status, action, state)
    }
}

/// Payload of an [`ERROR`] action.
#[derive(Clone)]
pub struct ErrorPayload {
    /// The normalized error value.
    pub err: Arc<dyn std::error::Error + Send + Sync>,
    /// Detailed message; defaults to the error's own rendering.
    pub message: String,
    /// Optional structured data describing the failure.
    pub data: Option<Value>,
}

impl fmt::Debug for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorPayload")
            .field("message", &self.message)
            .field("data", &self.data)
            .finish()
    }
}

/// Payload of a [`RESET_STATUS`] action.
#[derive(Clone, Debug)]
pub struct ResetStatusPayload {
    /// The status whose entry should be cleared from state.
    pub action_status: ActionStatus,
}

/// Action payload; the meaning of [`Payload::Value`] depends on the kind tag.
#[derive(Clone, Debug, Default)]
pub enum Payload {
    /// No payload.
    #[default]
    Empty,
    /// Opaque, kind-dependent value.
    Value(Value),
    /// Error details ([`ERROR`] actions).
    Error(ErrorPayload),
    /// Status to clear ([`RESET_STATUS`] actions).
    ResetStatus(ResetStatusPayload),
}

impl Payload {
    /// Returns the opaque value, if this is a [`Payload::Value`].
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Payload::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the error details, if this is a [`Payload::Error`].
    pub fn as_error(&self) -> Option<&ErrorPayload> {
        match self {
            Payload::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the reset payload, if this is a [`Payload::ResetStatus`].
    pub fn as_reset_status(&self) -> Option<&ResetStatusPayload> {
        match self {
            Payload::ResetStatus(r) => Some(r),
            _ => None,
        }
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Payload::Value(v)
    }
}

/// Envelope metadata shared by every action.
#[derive(Clone)]
pub struct Meta<S> {
    /// Unique per logical request; inherited along follow-up chains.
    pub uuid: Uuid,
    /// Creation time, epoch milliseconds.
    pub timestamp: u64,
    /// Groups actions caused by one user gesture.
    pub intent_tag: Option<Arc<str>>,
    /// The action this one continues or reports a failure for.
    ///
    /// Acyclic by construction; see the module docs.
    pub related: Option<Arc<Action<S>>>,
    /// Observer invoked when a status is recorded for this action or its
    /// continuations.
    pub status_hook: Option<Arc<dyn StatusHook<S>>>,
}

impl<S> fmt::Debug for Meta<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meta")
            .field("uuid", &self.uuid)
            .field("timestamp", &self.timestamp)
            .field("intent_tag", &self.intent_tag)
            .field("related", &self.related.as_ref().map(|a| a.kind().to_string()))
            .field("status_hook", &self.status_hook.is_some())
            .finish()
    }
}

/// Immutable message describing an intent or result, dispatched onto the bus.
///
/// Generic over the application state type `S` so status hooks and service
/// handlers can observe the concrete state tree.
#[derive(Clone, Debug)]
pub struct Action<S> {
    kind: Arc<str>,
    payload: Payload,
    meta: Meta<S>,
}

impl<S> Action<S> {
    /// Creates a freshly originated action with a new uuid.
    pub fn new(kind: impl Into<Arc<str>>, payload: impl Into<Payload>) -> Self {
        let action = Self {
            kind: kind.into(),
            payload: payload.into(),
            meta: Meta {
                uuid: Uuid::new_v4(),
                timestamp: now_millis(),
                intent_tag: None,
                related: None,
                status_hook: None,
            },
        };
        tracing::trace!(kind = %action.kind, uuid = %action.meta.uuid, "creating action");
        action
    }

    /// Creates a continuation of `related`: same logical request (inherited
    /// uuid), new step, with `related` recorded as the back-reference.
    pub fn follow_up(
        related: impl Into<Arc<Action<S>>>,
        kind: impl Into<Arc<str>>,
        payload: impl Into<Payload>,
    ) -> Self {
        let related = related.into();
        let action = Self {
            kind: kind.into(),
            payload: payload.into(),
            meta: Meta {
                uuid: related.meta.uuid,
                timestamp: now_millis(),
                intent_tag: related.meta.intent_tag.clone(),
                related: Some(related),
                status_hook: None,
            },
        };
        tracing::trace!(kind = %action.kind, uuid = %action.meta.uuid, "creating follow-up action");
        action
    }

    /// Creates an [`ERROR`] action reporting a failure of `related` (or a
    /// free-standing failure when `related` is `None`).
    ///
    /// The message defaults to the error's own rendering; override it with
    /// [`Action::with_error_message`]. Never fails.
    pub fn error(err: impl Into<BoxError>, related: Option<Arc<Action<S>>>) -> Self {
        let err: Arc<dyn std::error::Error + Send + Sync> = Arc::from(err.into());
        let message = err.to_string();
        let uuid = related
            .as_ref()
            .map(|a| a.meta.uuid)
            .unwrap_or_else(Uuid::new_v4);
        let action = Self {
            kind: Arc::from(ERROR),
            payload: Payload::Error(ErrorPayload {
                err,
                message,
                data: None,
            }),
            meta: Meta {
                uuid,
                timestamp: now_millis(),
                intent_tag: None,
                related,
                status_hook: None,
            },
        };
        tracing::trace!(uuid = %action.meta.uuid, "creating error action");
        action
    }

    /// Attaches an intent tag grouping actions caused by one user gesture.
    pub fn with_intent_tag(mut self, tag: impl Into<Arc<str>>) -> Self {
        self.meta.intent_tag = Some(tag.into());
        self
    }

    /// Attaches a status hook observing this action and its continuations.
    pub fn with_status_hook(mut self, hook: Arc<dyn StatusHook<S>>) -> Self {
        self.meta.status_hook = Some(hook);
        self
    }

    /// Overrides the message of an [`ERROR`] payload; no-op for other kinds.
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        if let Payload::Error(e) = &mut self.payload {
            e.message = message.into();
        }
        self
    }

    /// Attaches structured data to an [`ERROR`] payload; no-op otherwise.
    pub fn with_error_data(mut self, data: Value) -> Self {
        if let Payload::Error(e) = &mut self.payload {
            e.data = Some(data);
        }
        self
    }

    /// The string kind tag.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The envelope metadata.
    pub fn meta(&self) -> &Meta<S> {
        &self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Clone)]
    struct TestState;

    type TestAction = Action<TestState>;

    #[test]
    fn new_action_gets_fresh_identity() {
        let before = now_millis();
        let a = TestAction::new("LOAD", Payload::Value(json!({ "in": 5 })));
        assert_eq!(a.kind(), "LOAD");
        assert_eq!(a.payload().as_value(), Some(&json!({ "in": 5 })));
        assert!(!a.meta().uuid.is_nil());
        assert!(a.meta().timestamp >= before);
        assert!(a.meta().timestamp <= now_millis());
        assert!(a.meta().related.is_none());

        let b = TestAction::new("LOAD", Payload::Empty);
        assert_ne!(a.meta().uuid, b.meta().uuid);
    }

    #[test]
    fn follow_up_inherits_uuid_and_links_back() {
        let a = TestAction::new("LOAD", Payload::Empty).with_intent_tag("gesture-1");
        let uuid = a.meta().uuid;
        let b = TestAction::follow_up(a, SUCCESS, Payload::Value(json!(10)));
        assert_eq!(b.meta().uuid, uuid);
        let related = b.meta().related.as_ref().expect("back-reference");
        assert_eq!(related.kind(), "LOAD");
        assert_eq!(b.meta().intent_tag.as_deref(), Some("gesture-1"));
    }

    #[test]
    fn error_action_inherits_related_uuid() {
        let a = Arc::new(TestAction::new("LOAD", Payload::Empty));
        let e = TestAction::error("boom", Some(Arc::clone(&a)));
        assert_eq!(e.kind(), ERROR);
        assert_eq!(e.meta().uuid, a.meta().uuid);
        let payload = e.payload().as_error().expect("error payload");
        assert_eq!(payload.message, "boom");
    }

    #[test]
    fn error_action_without_related_gets_fresh_uuid() {
        let e1 = TestAction::error("boom", None);
        let e2 = TestAction::error("boom", None);
        assert!(!e1.meta().uuid.is_nil());
        assert_ne!(e1.meta().uuid, e2.meta().uuid);
    }

    #[test]
    fn error_message_and_data_overrides() {
        let e = TestAction::error("io failure", None)
            .with_error_message("loading profile failed")
            .with_error_data(json!({ "path": "/profile" }));
        let payload = e.payload().as_error().expect("error payload");
        assert_eq!(payload.message, "loading profile failed");
        assert_eq!(payload.err.to_string(), "io failure");
        assert_eq!(payload.data, Some(json!({ "path": "/profile" })));
    }
}
