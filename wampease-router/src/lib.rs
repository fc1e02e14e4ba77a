//! In-process WAMP router and loopback transport
//!
//! This crate implements the `wampease-core` boundary traits without a
//! network: a [`Router`] acts as broker and dealer for one realm, and a
//! [`LoopbackConnector`] hands out connections whose sessions live on that
//! router. A facade built on a `LoopbackConnector` behaves the way it would
//! against a real broker, including losing its session and reopening it.
//!
//! # Features
//!
//! - **Realms**: joining any other realm fails with `wamp.error.no_such_realm`
//! - **Pub/Sub**: exact and prefix topic matching, `exclude_me`,
//!   `acknowledge` and `disclose_me` publish options
//! - **RPC**: one callee per procedure, `wamp.error.no_such_procedure` for
//!   unknown calls, `wamp.error.procedure_already_exists` for duplicates
//! - **Authorization**: a deny list answered with `wamp.error.not_authorized`
//! - **Fault injection**: [`Router::drop_sessions`] and
//!   [`Router::set_available`]
//! - **Reconnection**: connections reopen according to a
//!   `ReconnectionStrategy`
//!
//! # Quick Start
//!
//! ```rust
//! use wampease_core::{procedure, ConnectOptions, ConnectionEvent, Connector, Dict};
//! use wampease_router::{LoopbackConnector, Router};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> wampease_core::Result<()> {
//! let router = Router::new("realm1");
//! let connection = LoopbackConnector::new(router).connect(&ConnectOptions::default())?;
//! let mut events = connection.open()?;
//!
//! if let Some(ConnectionEvent::Opened(session)) = events.recv().await {
//!     session
//!         .register("com.math.add2", procedure(|(n,): (i64,)| async move { Ok(n + 2) }), Dict::new())
//!         .await?;
//!     let four = session.call("com.math.add2", vec![json!(2)], Dict::new()).await?;
//!     assert_eq!(four, json!(4));
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod connection;
mod router;
mod session;
mod subscription;

pub use builder::RouterBuilder;
pub use connection::{LoopbackConnection, LoopbackConnector};
pub use router::{Router, TRANSPORT_LOST};
pub use session::LoopbackSession;
pub use subscription::MatchPolicy;
