//! Core types for wampease
//!
//! This crate holds everything the facade and its transports share:
//!
//! - **Error handling**: the `Error` enum and `Result` alias
//! - **Types**: handles, event and invocation payloads, close details
//! - **Boundary traits**: `Connector`, `Connection` and `Session`, the seam
//!   between the facade and whatever speaks the WAMP wire protocol
//! - **Argument adapter**: `FromArgs`/`IntoArgs` and the `procedure` /
//!   `event_handler` wrappers that let callbacks take positional parameters
//! - **Options**: the five sub-configurations and their shallow-merge store
//! - **Reconnection strategies**: backoff policies for self-healing transports
//! - **Observability**: tracing subscriber and OpenTelemetry bootstrap
//!
//! # Example
//!
//! ```rust
//! use wampease_core::{procedure, FromArgs, IntoArgs};
//!
//! let args = (2,).into_args().unwrap();
//! let (n,): (i64,) = FromArgs::from_args(args).unwrap();
//! assert_eq!(n, 2);
//!
//! let add2 = procedure(|(n,): (i64,)| async move { Ok(n + 2) });
//! # let _ = add2;
//! ```

pub mod adapter;
pub mod error;
pub mod observability;
pub mod options;
pub mod reconnect;
pub mod session;
pub mod types;
pub mod uri;

pub use adapter::{
    event_handler, procedure, raw_event_handler, raw_procedure, EventHandler, FromArgs, IntoArgs,
    ProcedureHandler,
};
pub use error::{Error, OperationKind, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use options::{ConnectOptions, Options, OptionsPatch, OptionsStore};
pub use reconnect::{ExponentialBackoff, FixedDelay, NoReconnect, ReconnectionStrategy};
pub use session::{Connection, ConnectionEvents, Connector, Session};
pub use types::{
    CloseDetails, CloseEvent, CloseReason, ConnectionEvent, Dict, Event, EventDetails, Invocation,
    InvocationDetails, Publication, Registration, SessionId, Subscription,
};
pub use uri::validate_uri;
