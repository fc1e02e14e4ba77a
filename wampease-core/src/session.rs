//! Boundary with the underlying WAMP protocol client
//!
//! The facade never speaks the wire protocol itself. It drives three
//! collaborators through these traits:
//!
//! - [`Connector`] builds a [`Connection`] from connect options
//! - [`Connection`] opens the transport and reports every open and close as a
//!   [`ConnectionEvent`] on an unbounded channel
//! - [`Session`] exposes the six WAMP actions against one established session
//!
//! A transport that reconnects on its own emits `Opened` again with a fresh
//! session after a `Closed` whose `will_retry` flag was set. Anything that
//! implements these traits can sit under the facade; `wampease-router`
//! provides an in-process implementation.

use crate::adapter::{EventHandler, ProcedureHandler};
use crate::options::ConnectOptions;
use crate::types::{ConnectionEvent, Dict, Publication, Registration, SessionId, Subscription};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Stream of lifecycle events produced by [`Connection::open`]
///
/// Ends after the final `Closed` event (the one with `will_retry == false`).
pub type ConnectionEvents = mpsc::UnboundedReceiver<ConnectionEvent>;

/// One established WAMP session
#[async_trait]
pub trait Session: Send + Sync {
    /// Broker-assigned session id
    fn id(&self) -> SessionId;

    /// Realm the session is joined to
    fn realm(&self) -> &str;

    /// Whether the session can still carry traffic
    fn is_open(&self) -> bool;

    /// Call a remote procedure with positional arguments
    async fn call(&self, procedure: &str, args: Vec<Value>, options: Dict) -> Result<Value>;

    /// Publish an event
    ///
    /// Returns `Some` only when `options` requests acknowledgement.
    async fn publish(
        &self,
        topic: &str,
        args: Vec<Value>,
        kwargs: Dict,
        options: Dict,
    ) -> Result<Option<Publication>>;

    /// Subscribe `handler` to `topic`
    async fn subscribe(
        &self,
        topic: &str,
        handler: EventHandler,
        options: Dict,
    ) -> Result<Subscription>;

    /// Cancel a subscription
    async fn unsubscribe(&self, subscription: &Subscription) -> Result<()>;

    /// Register `handler` as the implementation of `procedure`
    async fn register(
        &self,
        procedure: &str,
        handler: ProcedureHandler,
        options: Dict,
    ) -> Result<Registration>;

    /// Cancel a registration
    async fn unregister(&self, registration: &Registration) -> Result<()>;
}

/// The outbound link to a broker
#[async_trait]
pub trait Connection: Send + Sync {
    /// Start the transport
    ///
    /// May be called once per connection. The returned channel receives
    /// `Opened` for every established session and `Closed` for every loss or
    /// shutdown.
    fn open(&self) -> Result<ConnectionEvents>;

    /// Request closure with an optional reason URI and message
    ///
    /// Fails with [`Error::NotConnected`](crate::Error::NotConnected) when the
    /// transport is not running. Completion of this call means the request was
    /// accepted; the matching `Closed` event confirms it.
    async fn close(&self, reason: Option<String>, message: Option<String>) -> Result<()>;

    /// Session currently open on this connection, if any
    fn session(&self) -> Option<Arc<dyn Session>>;

    /// Whether a session is currently open
    fn is_open(&self) -> bool {
        self.session().is_some()
    }
}

/// Factory for connections
pub trait Connector: Send + Sync {
    /// Build a connection for `config` without performing any I/O
    fn connect(&self, config: &ConnectOptions) -> Result<Arc<dyn Connection>>;
}
