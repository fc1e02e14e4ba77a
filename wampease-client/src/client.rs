//! The WAMP client facade
//!
//! `WampClient` wraps a [`Connector`] and exposes a small surface:
//!
//! 1. **Connect / disconnect**: one connection at a time; `connect` resolves
//!    once the first session opens
//! 2. **RPC**: `register`, `unregister`, `call`
//! 3. **Pub/Sub**: `publish`, `subscribe`, `unsubscribe`
//! 4. **Hooks**: open, close, recover and error callbacks
//! 5. **Recovery**: whenever the transport reopens a lost session, every
//!    tracked subscription and registration is replayed on the new session
//!
//! Callbacks take positional parameters; see [`wampease_core::adapter`].
//!
//! # Examples
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
//!     .register(Procedure::new("com.math.add2", |(a, b): (i64, i64)| async move { Ok(a + b) }))
//!     .await?;
//! let sum: i64 = client.call("com.math.add2", (2, 2)).await?;
//! assert_eq!(sum, 4);
//!
//! client.disconnect(None, None).await?;
//! # Ok(())
//! # }
//! ```

use crate::client_builder::ClientBuilder;
use crate::connection_state::{ConnectionState, SessionManager};
use crate::hooks::LifecycleHooks;
use crate::metrics::ClientMetrics;
use crate::recovery::{self, RecoveryReport};
use crate::registry::OperationRegistry;
use crate::request::{register_one, subscribe_once, Procedure, RegisterRequest};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use wampease_core::{
    event_handler, validate_uri, CloseEvent, ConnectOptions, Connection, ConnectionEvent,
    ConnectionEvents, Connector, Dict, Error, EventHandler, FromArgs, IntoArgs, Options,
    OptionsPatch, OptionsStore, Publication, Result, Session,
};

/// WAMP client facade with transparent recovery
///
/// Cheap to clone; clones share the connection, options, hooks and tracked
/// operations.
#[derive(Clone)]
pub struct WampClient {
    connector: Arc<dyn Connector>,
    options: OptionsStore,
    registry: OperationRegistry,
    hooks: LifecycleHooks,
    sessions: Arc<SessionManager>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl WampClient {
    /// Client with default options and no metrics
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self::from_parts(Arc::new(connector), Options::default(), None)
    }

    /// Start configuring a client
    pub fn builder(connector: impl Connector + 'static) -> ClientBuilder {
        ClientBuilder::new(connector)
    }

    pub(crate) fn from_parts(
        connector: Arc<dyn Connector>,
        options: Options,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        Self {
            connector,
            options: OptionsStore::new(options),
            registry: OperationRegistry::new(),
            hooks: LifecycleHooks::new(),
            sessions: Arc::new(SessionManager::new()),
            metrics,
        }
    }

    /// Snapshot copy of the current options
    pub async fn get_options(&self) -> Options {
        self.options.get().await
    }

    /// Shallow-merge `patch` over the current options
    pub async fn set_options(&self, patch: OptionsPatch) {
        self.options.set(patch).await;
    }

    /// Restore the built-in default options
    pub async fn reset_options_to_default(&self) {
        self.options.reset().await;
    }

    /// Called with the session on every open, including reopens
    pub async fn on_open<F>(&self, hook: F)
    where
        F: Fn(Arc<dyn Session>) + Send + Sync + 'static,
    {
        self.hooks.set_on_open(hook).await;
    }

    /// Called on every close with its reason and details
    pub async fn on_close<F>(&self, hook: F)
    where
        F: Fn(&CloseEvent) + Send + Sync + 'static,
    {
        self.hooks.set_on_close(hook).await;
    }

    /// Called after each recovery pass
    pub async fn on_recover<F>(&self, hook: F)
    where
        F: Fn(&RecoveryReport) + Send + Sync + 'static,
    {
        self.hooks.set_on_recover(hook).await;
    }

    /// Called for each item recovery could not restore
    pub async fn on_error<F>(&self, hook: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.hooks.set_on_error(hook).await;
    }

    /// Open a connection and wait for the first session
    ///
    /// Uses `config` when given, otherwise the current `connect` options.
    /// Fails with the close reason if the transport closes before opening.
    #[tracing::instrument(skip(self, config))]
    pub async fn connect(&self, config: Option<ConnectOptions>) -> Result<()> {
        let config = match config {
            Some(config) => config,
            None => self.options.get().await.connect,
        };

        self.sessions.begin_connect().await?;
        self.record_state(ConnectionState::Connecting);
        tracing::info!(url = %config.url, realm = %config.realm, "Connecting");

        let opened = self.connector.connect(&config).and_then(|connection| {
            let events = connection.open()?;
            Ok((connection, events))
        });
        let (connection, events) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                self.sessions.abort_connect().await;
                self.record_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };
        self.sessions.set_connection(Arc::clone(&connection)).await;

        let (ready_tx, ready_rx) = oneshot::channel();
        let driver = tokio::spawn(self.clone().drive(events, ready_tx));

        match ready_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Connection closed before opening");
                // The transport may still be retrying; stop it before giving up
                let _ = connection.close(None, None).await;
                let _ = driver.await;
                Err(e)
            }
            Err(_) => {
                let _ = driver.await;
                Err(Error::Internal(
                    "connection event stream ended before opening".to_string(),
                ))
            }
        }
    }

    /// Close the connection and wait until the transport confirms it
    #[tracing::instrument(skip(self))]
    pub async fn disconnect(&self, reason: Option<&str>, message: Option<&str>) -> Result<()> {
        let mut closed = self.sessions.watch_close();
        let connection = self.sessions.connection().await?;

        connection
            .close(reason.map(str::to_string), message.map(str::to_string))
            .await?;

        let _ = closed.changed().await;
        tracing::info!("Disconnected");
        Ok(())
    }

    /// The open session
    pub async fn get_session(&self) -> Result<Arc<dyn Session>> {
        self.sessions.session().await
    }

    /// The current connection
    pub async fn get_connection(&self) -> Result<Arc<dyn Connection>> {
        self.sessions.connection().await
    }

    /// Get the current connection state
    pub async fn connection_state(&self) -> ConnectionState {
        self.sessions.state().await
    }

    /// Check if a session is open
    pub async fn is_connected(&self) -> bool {
        self.sessions.state().await == ConnectionState::Connected
    }

    /// Handle every event the connection reports until its final close
    async fn drive(self, mut events: ConnectionEvents, ready: oneshot::Sender<Result<()>>) {
        let mut ready = Some(ready);
        let mut opened_before = false;

        while let Some(event) = events.recv().await {
            match event {
                ConnectionEvent::Opened(session) => {
                    let reopened = opened_before;
                    opened_before = true;

                    self.sessions.opened(Arc::clone(&session)).await;
                    self.record_state(ConnectionState::Connected);
                    tracing::info!(
                        session_id = session.id(),
                        realm = %session.realm(),
                        reopened,
                        "Session opened"
                    );

                    self.hooks.open(Arc::clone(&session)).await;
                    if let Some(ready) = ready.take() {
                        let _ = ready.send(Ok(()));
                    }

                    if reopened {
                        if let Some(ref m) = self.metrics {
                            m.record_reconnection();
                        }
                        self.recover(session).await;
                    }
                }
                ConnectionEvent::Closed(close) => {
                    let will_retry = close.details.will_retry;
                    let state = self.sessions.closed(will_retry, opened_before).await;
                    self.record_state(state);
                    tracing::info!(
                        reason = %close.reason,
                        detail = ?close.details.reason,
                        will_retry,
                        "Connection closed"
                    );

                    if let Some(ready) = ready.take() {
                        let _ = ready.send(Err(close.to_error()));
                    }
                    self.hooks.close(&close).await;

                    if !will_retry {
                        break;
                    }
                }
            }
        }

        self.sessions.finish().await;
        self.record_state(ConnectionState::Disconnected);
    }

    async fn recover(&self, session: Arc<dyn Session>) {
        let options = self.options.get().await;
        tracing::info!(session_id = session.id(), "Recovering tracked operations");

        match recovery::replay(&self.registry, &self.hooks, &session, &options).await {
            Ok(report) => {
                if let Some(ref m) = self.metrics {
                    m.record_recovery(&report);
                }
                tracing::info!(
                    subscriptions = report.subscriptions,
                    registrations = report.registrations,
                    failed = report.failed,
                    "Recovery finished"
                );
                self.hooks.recover(&report).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Recovery could not run");
                if let Some(ref m) = self.metrics {
                    m.record_error("recovery");
                }
                self.hooks.error(&e).await;
            }
        }
    }

    /// Register one procedure or a batch of them
    ///
    /// A batch is registered in order and stops at the first failure, which
    /// is returned as [`Error::Batch`]; earlier items stay registered.
    #[tracing::instrument(skip(self, request))]
    pub async fn register(&self, request: impl Into<RegisterRequest>) -> Result<()> {
        let start = Instant::now();
        let result = match request.into() {
            RegisterRequest::Single(procedure) => self.register_procedure(procedure).await,
            RegisterRequest::Batch(procedures) => {
                let mut result = Ok(());
                for (index, procedure) in procedures.into_iter().enumerate() {
                    let name = procedure.name.clone();
                    if let Err(e) = self.register_procedure(procedure).await {
                        result = Err(Error::batch(index, name, e));
                        break;
                    }
                }
                result
            }
        };
        self.observe("register", start, &result);
        result
    }

    async fn register_procedure(&self, procedure: Procedure) -> Result<()> {
        let Procedure { name, handler } = procedure;
        validate_uri(&name)?;

        if !self.registry.registrations.lock().await.reserve(&name) {
            return Err(Error::AlreadyRegistered(name));
        }

        let result = match self.sessions.session().await {
            Ok(session) => {
                let options = self.options.get().await.register;
                register_one(&session, &name, Arc::clone(&handler), options).await
            }
            Err(e) => Err(e),
        };

        let mut store = self.registry.registrations.lock().await;
        match result {
            Ok(registration) => {
                store.put(&name, handler, registration);
                Ok(())
            }
            Err(e) => {
                store.release(&name);
                Err(e)
            }
        }
    }

    /// Unregister one or more procedures, in order
    ///
    /// With more than one name, stops at the first failure and returns it as
    /// [`Error::Batch`]; names before it stay unregistered.
    #[tracing::instrument(skip(self, names))]
    pub async fn unregister<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let start = Instant::now();
        let names: Vec<String> = names.into_iter().map(Into::into).collect();

        let result = match names.as_slice() {
            [name] => self.unregister_procedure(name).await,
            _ => {
                let mut result = Ok(());
                for (index, name) in names.iter().enumerate() {
                    if let Err(e) = self.unregister_procedure(name).await {
                        result = Err(Error::batch(index, name.clone(), e));
                        break;
                    }
                }
                result
            }
        };
        self.observe("unregister", start, &result);
        result
    }

    async fn unregister_procedure(&self, name: &str) -> Result<()> {
        if !self.registry.is_registered(name).await {
            return Err(Error::NotRegistered(name.to_string()));
        }
        let session = self.sessions.session().await?;

        let live = {
            let mut store = self.registry.registrations.lock().await;
            let entry = store
                .get(name)
                .cloned()
                .ok_or_else(|| Error::NotRegistered(name.to_string()))?;
            // A handle from an earlier session died with it; dropping the
            // entry under the lock also stops a running replay from reviving it
            if entry.handle.session == session.id() {
                Some(entry)
            } else {
                store.delete(name);
                None
            }
        };

        if let Some(entry) = live {
            session.unregister(&entry.handle).await?;
            self.registry.registrations.lock().await.delete(name);
        }
        tracing::debug!(procedure = %name, "Unregistered");
        Ok(())
    }

    /// Call a remote procedure with positional arguments
    ///
    /// ```rust,no_run
    /// # async fn example(client: &wampease_client::WampClient) -> wampease_core::Result<()> {
    /// let greeting: String = client.call("com.text.concat", ("Hola", "Mundo")).await?;
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self, args), fields(procedure = %procedure))]
    pub async fn call<A, R>(&self, procedure: &str, args: A) -> Result<R>
    where
        A: IntoArgs,
        R: DeserializeOwned,
    {
        let start = Instant::now();
        let result = match self.call_value(procedure, args).await {
            Ok(value) => serde_json::from_value(value).map_err(Error::from),
            Err(e) => Err(e),
        };
        self.observe("call", start, &result);
        result
    }

    async fn call_value<A: IntoArgs>(&self, procedure: &str, args: A) -> Result<Value> {
        validate_uri(procedure)?;
        let args = args.into_args()?;
        let session = self.sessions.session().await?;
        let options = self.options.get().await.call;
        session.call(procedure, args, options).await
    }

    /// Publish an event with positional arguments
    ///
    /// Returns the publication only when the `acknowledge` publish option is
    /// set; otherwise `Ok(None)` as soon as the event was handed off.
    #[tracing::instrument(skip(self, args), fields(topic = %topic))]
    pub async fn publish<A: IntoArgs>(&self, topic: &str, args: A) -> Result<Option<Publication>> {
        let start = Instant::now();
        let result = self.publish_args(topic, args).await;
        self.observe("publish", start, &result);
        result
    }

    async fn publish_args<A: IntoArgs>(&self, topic: &str, args: A) -> Result<Option<Publication>> {
        validate_uri(topic)?;
        let args = args.into_args()?;
        let session = self.sessions.session().await?;
        let options = self.options.get().await;
        let acknowledge = options.publish_acknowledged();

        let publication = session
            .publish(topic, args, Dict::new(), options.publish)
            .await?;
        Ok(if acknowledge { publication } else { None })
    }

    /// Subscribe a positional callback to `topic`
    ///
    /// ```rust,no_run
    /// # async fn example(client: &wampease_client::WampClient) -> wampease_core::Result<()> {
    /// client
    ///     .subscribe("com.example.numbers", |(n1, n2): (i64, i64)| async move {
    ///         println!("{n1} {n2}");
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn subscribe<T, F, Fut>(&self, topic: &str, f: F) -> Result<()>
    where
        T: FromArgs + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe_handler(topic, event_handler(f)).await
    }

    /// Subscribe an already adapted handler to `topic`
    #[tracing::instrument(skip(self, handler), fields(topic = %topic))]
    pub async fn subscribe_handler(&self, topic: &str, handler: EventHandler) -> Result<()> {
        let start = Instant::now();
        let result = self.subscribe_topic(topic, handler).await;
        self.observe("subscribe", start, &result);
        result
    }

    async fn subscribe_topic(&self, topic: &str, handler: EventHandler) -> Result<()> {
        validate_uri(topic)?;

        if !self.registry.subscriptions.lock().await.reserve(topic) {
            return Err(Error::AlreadySubscribed(topic.to_string()));
        }

        let result = match self.sessions.session().await {
            Ok(session) => {
                let options = self.options.get().await.subscribe;
                subscribe_once(&session, topic, Arc::clone(&handler), options).await
            }
            Err(e) => Err(e),
        };

        let mut store = self.registry.subscriptions.lock().await;
        match result {
            Ok(subscription) => {
                store.put(topic, handler, subscription);
                Ok(())
            }
            Err(e) => {
                store.release(topic);
                Err(e)
            }
        }
    }

    /// Cancel the subscription on `topic`
    #[tracing::instrument(skip(self), fields(topic = %topic))]
    pub async fn unsubscribe(&self, topic: &str) -> Result<()> {
        let start = Instant::now();
        let result = self.unsubscribe_topic(topic).await;
        self.observe("unsubscribe", start, &result);
        result
    }

    async fn unsubscribe_topic(&self, topic: &str) -> Result<()> {
        if !self.registry.is_subscribed(topic).await {
            return Err(Error::NotSubscribed(topic.to_string()));
        }
        let session = self.sessions.session().await?;

        let live = {
            let mut store = self.registry.subscriptions.lock().await;
            let entry = store
                .get(topic)
                .cloned()
                .ok_or_else(|| Error::NotSubscribed(topic.to_string()))?;
            if entry.handle.session == session.id() {
                Some(entry)
            } else {
                store.delete(topic);
                None
            }
        };

        if let Some(entry) = live {
            session.unsubscribe(&entry.handle).await?;
            self.registry.subscriptions.lock().await.delete(topic);
        }
        tracing::debug!(topic = %topic, "Unsubscribed");
        Ok(())
    }

    /// Subscribed topics in the order they were subscribed
    pub async fn subscriptions(&self) -> Vec<String> {
        self.registry.topics().await
    }

    /// Registered procedures in the order they were registered
    pub async fn registrations(&self) -> Vec<String> {
        self.registry.procedures().await
    }

    fn record_state(&self, state: ConnectionState) {
        if let Some(ref m) = self.metrics {
            m.update_connection_state(state);
        }
    }

    fn observe<T>(&self, operation: &str, start: Instant, result: &Result<T>) {
        let Some(ref m) = self.metrics else {
            return;
        };
        let duration = start.elapsed().as_secs_f64();
        match result {
            Ok(_) => m.record_operation(operation, "success", duration),
            Err(e) => {
                m.record_operation(operation, "error", duration);
                m.record_error(e.root().uri());
            }
        }
    }
}
