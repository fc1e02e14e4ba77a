//! Error types for wampease
//!
//! A single `Error` enum covers every failure the facade can surface, from
//! caller mistakes caught at the boundary to failures reported by the
//! underlying WAMP session.
//!
//! # Error Categories
//!
//! - **Invalid input**: `InvalidArgument` for malformed names or arguments
//! - **Bookkeeping**: `AlreadySubscribed`, `NotSubscribed`,
//!   `AlreadyRegistered`, `NotRegistered`
//! - **Batch context**: `Batch` wraps the first failing item of a batch with
//!   its position and name
//! - **Recovery**: `Recovery` wraps a single failed replay after a reconnect
//! - **Underlying client**: `Protocol`, `ConnectionClosed`, `NotConnected`
//!
//! Every variant maps onto a WAMP error URI through [`Error::uri`], so a
//! procedure handler can return any of them and the caller still sees a
//! well-formed protocol error.
//!
//! # Examples
//!
//! ```rust
//! use wampease_core::Error;
//!
//! let err = Error::NotRegistered("com.example.add".into());
//! assert_eq!(err.uri(), "wampease.error.not_registered");
//!
//! let wrapped = Error::batch(1, "com.example.bad", err);
//! assert!(wrapped.to_string().contains("com.example.bad"));
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for wampease operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which kind of tracked operation a recovery failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// A topic subscription
    Subscription,
    /// A procedure registration
    Registration,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Subscription => f.write_str("subscription"),
            OperationKind::Registration => f.write_str("registration"),
        }
    }
}

/// Application-level error type for wampease operations
///
/// Cloneable so that a single failure can be both returned to a caller and
/// handed to the error lifecycle hook.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Malformed caller input (bad URI, undecodable argument, bad option)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The topic already has an active subscription on this client
    #[error("Already subscribed to topic: {0}")]
    AlreadySubscribed(String),

    /// The topic is not subscribed on this client
    #[error("Not subscribed to topic: {0}")]
    NotSubscribed(String),

    /// The procedure is already registered by this client
    #[error("Procedure already registered: {0}")]
    AlreadyRegistered(String),

    /// The procedure is not registered by this client
    #[error("Procedure not registered: {0}")]
    NotRegistered(String),

    /// First failure of a sequential batch, annotated with the offending item
    ///
    /// Items before `index` completed and were not rolled back; items after
    /// it were never attempted.
    #[error("Batch item {index} ('{name}') failed: {source}")]
    Batch {
        /// Zero-based position of the failing item
        index: usize,
        /// Procedure or topic name of the failing item
        name: String,
        /// The underlying failure
        source: Box<Error>,
    },

    /// A single subscription or registration could not be replayed after a
    /// reconnect
    #[error("Failed to restore {kind} '{name}': {source}")]
    Recovery {
        /// Subscription or registration
        kind: OperationKind,
        /// Topic or procedure name
        name: String,
        /// The underlying failure
        source: Box<Error>,
    },

    /// Error reported by the broker or a remote procedure
    ///
    /// `uri` is the WAMP error URI (for example
    /// `wamp.error.no_such_procedure`).
    #[error("{uri}: {message}")]
    Protocol {
        /// WAMP error URI
        uri: String,
        /// Human-readable detail
        message: String,
    },

    /// The transport closed, carrying the close reason and optional message
    #[error("Connection closed ({reason}){}", suffix(.message))]
    ConnectionClosed {
        /// Close reason (`closed`, `lost`, `unreachable`, ...)
        reason: String,
        /// Optional detail message or protocol reason URI
        message: Option<String>,
    },

    /// No open session or connection is available
    #[error("Not connected")]
    NotConnected,

    /// `connect` was called while a connection already exists
    #[error("Already connected")]
    AlreadyConnected,

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a protocol error from a WAMP error URI and message
    pub fn protocol(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Protocol {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Wrap `source` as the failing item of a batch
    pub fn batch(index: usize, name: impl Into<String>, source: Error) -> Self {
        Error::Batch {
            index,
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Wrap `source` as a failed recovery replay
    pub fn recovery(kind: OperationKind, name: impl Into<String>, source: Error) -> Self {
        Error::Recovery {
            kind,
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// WAMP error URI for this error
    ///
    /// Wrapping variants report the URI of the error they wrap.
    pub fn uri(&self) -> &str {
        match self {
            Error::InvalidArgument(_) => "wamp.error.invalid_argument",
            Error::AlreadySubscribed(_) => "wampease.error.already_subscribed",
            Error::NotSubscribed(_) => "wampease.error.not_subscribed",
            Error::AlreadyRegistered(_) => "wamp.error.procedure_already_exists",
            Error::NotRegistered(_) => "wampease.error.not_registered",
            Error::Batch { source, .. } | Error::Recovery { source, .. } => source.uri(),
            Error::Protocol { uri, .. } => uri,
            Error::ConnectionClosed { .. } => "wamp.close.transport_lost",
            Error::NotConnected => "wampease.error.not_connected",
            Error::AlreadyConnected => "wampease.error.already_connected",
            Error::Serialization(_) => "wamp.error.invalid_argument",
            Error::Internal(_) => "wamp.error.runtime_error",
        }
    }

    /// The innermost error, looking through `Batch` and `Recovery` wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::Batch { source, .. } | Error::Recovery { source, .. } => source.root(),
            other => other,
        }
    }
}

fn suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
