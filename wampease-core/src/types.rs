//! WAMP data types shared by the facade and the transports
//!
//! These mirror the shapes the underlying protocol client hands back:
//! opaque handles for subscriptions and registrations, the payloads passed
//! to event and procedure handlers, and the events a connection emits as it
//! opens and closes.
//!
//! WAMP carries payloads as a positional argument list plus a keyword
//! dictionary. Both are kept as `serde_json` values so any serializer can sit
//! underneath.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::session::Session;

/// Keyword arguments and option bags
pub type Dict = serde_json::Map<String, Value>;

/// Broker-assigned session identifier
pub type SessionId = u64;

/// Handle for an active subscription
///
/// Returned by the session when a subscribe succeeds and needed to cancel it
/// later. A handle belongs to the session that issued it; after a reconnect
/// it is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Broker-assigned subscription id
    pub id: u64,
    /// Topic the subscription was made for
    pub topic: String,
    /// Session that owns the subscription
    pub session: SessionId,
}

/// Handle for an active procedure registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Broker-assigned registration id
    pub id: u64,
    /// Procedure the registration was made for
    pub procedure: String,
    /// Session that owns the registration
    pub session: SessionId,
}

/// Acknowledgement of a publish made with `acknowledge: true`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    /// Broker-assigned publication id
    pub id: u64,
}

/// Metadata delivered alongside an event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventDetails {
    /// Topic the event was published to
    pub topic: String,
    /// Publication id assigned by the broker
    pub publication: u64,
    /// Publisher session, when disclosed
    pub publisher: Option<SessionId>,
}

/// An event received on a subscription
#[derive(Debug, Clone, Default)]
pub struct Event {
    /// Positional payload
    pub args: Vec<Value>,
    /// Keyword payload
    pub kwargs: Dict,
    /// Delivery metadata
    pub details: EventDetails,
}

/// Metadata delivered alongside an invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvocationDetails {
    /// Procedure being invoked
    pub procedure: String,
    /// Calling session, when disclosed
    pub caller: Option<SessionId>,
}

/// A call routed to a registered procedure
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Positional arguments
    pub args: Vec<Value>,
    /// Keyword arguments
    pub kwargs: Dict,
    /// Invocation metadata
    pub details: InvocationDetails,
}

/// Why a connection closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseReason {
    /// Closed on request of the local side
    Closed,
    /// An open session was lost unexpectedly
    Lost,
    /// The broker could not be reached or refused the session
    Unreachable,
    /// The transport or serializer is not supported by the broker
    Unsupported,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::Closed => "closed",
            CloseReason::Lost => "lost",
            CloseReason::Unreachable => "unreachable",
            CloseReason::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// Details accompanying a close
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseDetails {
    /// WAMP reason URI, if the broker or the closer supplied one
    pub reason: Option<String>,
    /// Human-readable message
    pub message: Option<String>,
    /// Whether the transport will try to reopen on its own
    pub will_retry: bool,
    /// Reconnect attempts made so far
    pub retry_count: u32,
    /// Delay before the next reconnect attempt
    pub retry_delay: Option<Duration>,
}

/// A close reported by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    /// Close category
    pub reason: CloseReason,
    /// Close details
    pub details: CloseDetails,
}

impl CloseEvent {
    /// Convert the close into the error used to fail a pending connect
    pub fn to_error(&self) -> crate::Error {
        crate::Error::ConnectionClosed {
            reason: self.reason.to_string(),
            message: self
                .details
                .message
                .clone()
                .or_else(|| self.details.reason.clone()),
        }
    }
}

/// Lifecycle event emitted by a [`Connection`](crate::Connection)
#[derive(Clone)]
pub enum ConnectionEvent {
    /// A session was established (first open or reopen)
    Opened(Arc<dyn Session>),
    /// The session closed; `details.will_retry` says whether a reopen follows
    Closed(CloseEvent),
}

impl fmt::Debug for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionEvent::Opened(session) => {
                f.debug_tuple("Opened").field(&session.id()).finish()
            }
            ConnectionEvent::Closed(close) => f.debug_tuple("Closed").field(close).finish(),
        }
    }
}
