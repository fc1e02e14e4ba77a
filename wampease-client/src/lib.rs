//! WAMP client facade with transparent recovery
//!
//! This crate wraps any `wampease-core` [`Connector`](wampease_core::Connector)
//! in a small, forgiving API and keeps the caller's subscriptions and
//! registrations alive across reconnects.
//!
//! # Features
//!
//! - **Positional callbacks**: handlers take `(a, b, ...)` tuples instead of
//!   argument lists
//! - **Operation tracking**: every subscription and registration is
//!   remembered with its handler and live handle
//! - **Recovery**: when the transport reopens a lost session, subscriptions
//!   and then registrations are replayed; a failing item is reported through
//!   the error hook without stopping the rest
//! - **Lifecycle hooks**: open, close, recover and error callbacks
//! - **Options**: shallow-merged option bags passed to every action
//! - **Observability**: tracing spans and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust
//! use wampease_client::{Procedure, WampClient};
//! use wampease_router::{LoopbackConnector, Router};
//!
//! # #[tokio::main]
//! # async fn main() -> wampease_core::Result<()> {
//! let client = WampClient::new(LoopbackConnector::new(Router::new("realm1")));
//! client.connect(None).await?;
//!
//! client
//!     .register(Procedure::new("com.text.concat", |(a, b): (String, String)| async move {
//!         Ok(format!("{a} {b}"))
//!     }))
//!     .await?;
//!
//! let text: String = client.call("com.text.concat", ("Hola", "Mundo")).await?;
//! assert_eq!(text, "Hola Mundo");
//! # Ok(())
//! # }
//! ```
//!
//! # Recovery
//!
//! ```rust,no_run
//! use wampease_client::WampClient;
//!
//! # async fn example(client: WampClient) {
//! client
//!     .on_recover(|report| {
//!         tracing::info!(restored = report.subscriptions + report.registrations, "Recovered");
//!     })
//!     .await;
//! client
//!     .on_error(|error| tracing::warn!(%error, "Could not restore"))
//!     .await;
//! # }
//! ```

mod client;
mod client_builder;
mod connection_state;
mod hooks;
mod metrics;
mod recovery;
mod registry;
mod request;

pub use client::WampClient;
pub use client_builder::ClientBuilder;
pub use connection_state::ConnectionState;
pub use hooks::{CloseHook, ErrorHook, LifecycleHooks, OpenHook, RecoverHook};
pub use metrics::ClientMetrics;
pub use recovery::RecoveryReport;
pub use registry::{Entry, OperationRegistry, RegistrationEntry, SubscriptionEntry};
pub use request::{Procedure, RegisterRequest};

// Re-export core types
pub use wampease_core::{
    event_handler, procedure, raw_event_handler, raw_procedure, CloseDetails, CloseEvent,
    CloseReason, ConnectOptions, Error, Event, EventHandler, FromArgs, IntoArgs, Invocation,
    OperationKind, Options, OptionsPatch, ProcedureHandler, Publication, Result, Session,
};
