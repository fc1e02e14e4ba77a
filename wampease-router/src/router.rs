//! In-process broker and dealer
//!
//! The router owns one realm and routes the six WAMP actions between the
//! sessions attached to it:
//!
//! - **Broker**: subscriptions, publication fan-out, `exclude_me` and
//!   `acknowledge` publish options, exact and prefix topic matching
//! - **Dealer**: one callee per procedure, call dispatch, duplicate
//!   registration rejection
//! - **Authorization**: a deny list of URIs that may not be subscribed to or
//!   registered
//! - **Fault injection**: [`Router::drop_sessions`] severs every attached
//!   session the way a network failure would, and
//!   [`Router::set_available`] refuses new sessions while "down"
//!
//! # Thread Safety
//!
//! Routers are cheaply cloneable (`Arc`-based). Handler futures are always
//! awaited with the routing tables unlocked, so handlers may call back into
//! the router.
//!
//! # Examples
//!
//! ```rust
//! use wampease_router::Router;
//!
//! let router = Router::builder().realm("realm1").deny("com.secret.topic").build();
//! assert_eq!(router.realm(), "realm1");
//! ```

use crate::builder::RouterBuilder;
use crate::session::LoopbackSession;
use crate::subscription::{MatchPolicy, SubscriptionEntry, SubscriptionTable};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use wampease_core::{
    CloseDetails, Dict, Error, Event, EventDetails, EventHandler, Invocation, InvocationDetails,
    ProcedureHandler, Publication, Registration, Result, SessionId, Subscription,
};

/// Close reason sent to sessions severed by [`Router::drop_sessions`]
pub const TRANSPORT_LOST: &str = "wamp.close.transport_lost";

struct SessionEntry {
    open: Arc<AtomicBool>,
    lost: Option<oneshot::Sender<CloseDetails>>,
}

struct RegistrationEntry {
    id: u64,
    session: SessionId,
    handler: ProcedureHandler,
}

#[derive(Default)]
struct RoutingTables {
    sessions: HashMap<SessionId, SessionEntry>,
    subscriptions: SubscriptionTable,
    registrations: HashMap<String, RegistrationEntry>,
    denied: HashSet<String>,
}

impl RoutingTables {
    fn remove_session(&mut self, session: SessionId) -> Option<SessionEntry> {
        let entry = self.sessions.remove(&session)?;
        entry.open.store(false, Ordering::SeqCst);
        self.subscriptions.remove_session(session);
        self.registrations.retain(|_, r| r.session != session);
        Some(entry)
    }
}

struct RouterInner {
    realm: String,
    next_id: AtomicU64,
    available: AtomicBool,
    tables: Mutex<RoutingTables>,
}

/// An in-process WAMP router for one realm
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    /// Router for `realm` with an empty deny list
    pub fn new(realm: impl Into<String>) -> Self {
        Self::with_denied(realm, HashSet::new())
    }

    pub(crate) fn with_denied(realm: impl Into<String>, denied: HashSet<String>) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                realm: realm.into(),
                next_id: AtomicU64::new(1),
                available: AtomicBool::new(true),
                tables: Mutex::new(RoutingTables {
                    denied,
                    ..Default::default()
                }),
            }),
        }
    }

    /// Start building a router
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Realm served by this router
    pub fn realm(&self) -> &str {
        &self.inner.realm
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Join `realm`, returning the new session and a receiver that fires if
    /// the session is severed by the router
    pub async fn attach(
        &self,
        realm: &str,
    ) -> Result<(LoopbackSession, oneshot::Receiver<CloseDetails>)> {
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed {
                reason: "unreachable".to_string(),
                message: Some("router is not accepting sessions".to_string()),
            });
        }
        if realm != self.inner.realm {
            return Err(Error::protocol(
                "wamp.error.no_such_realm",
                format!("realm '{realm}' does not exist"),
            ));
        }

        let id = self.next_id();
        let open = Arc::new(AtomicBool::new(true));
        let (lost_tx, lost_rx) = oneshot::channel();

        self.inner.tables.lock().await.sessions.insert(
            id,
            SessionEntry {
                open: Arc::clone(&open),
                lost: Some(lost_tx),
            },
        );

        tracing::debug!(session_id = id, realm = %realm, "Session attached");
        Ok((LoopbackSession::new(id, realm, self.clone(), open), lost_rx))
    }

    /// Leave the realm, dropping everything the session owned
    pub async fn detach(&self, session: SessionId) {
        let removed = self.inner.tables.lock().await.remove_session(session);
        if removed.is_some() {
            tracing::debug!(session_id = session, "Session detached");
        }
    }

    /// Sever every attached session as if the network failed
    ///
    /// Each session's transport is told the session was lost; a transport
    /// with a reconnection strategy will then try to attach again. Returns
    /// how many sessions were dropped.
    pub async fn drop_sessions(&self) -> usize {
        let mut tables = self.inner.tables.lock().await;
        let ids: Vec<SessionId> = tables.sessions.keys().copied().collect();

        for id in &ids {
            if let Some(mut entry) = tables.remove_session(*id) {
                if let Some(lost) = entry.lost.take() {
                    let _ = lost.send(CloseDetails {
                        reason: Some(TRANSPORT_LOST.to_string()),
                        message: Some("session dropped by router".to_string()),
                        ..Default::default()
                    });
                }
            }
        }

        tracing::info!(dropped = ids.len(), "Dropped all sessions");
        ids.len()
    }

    /// Accept (`true`) or refuse (`false`) new sessions
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Refuse future subscriptions and registrations on `uri`
    pub async fn deny(&self, uri: impl Into<String>) {
        self.inner.tables.lock().await.denied.insert(uri.into());
    }

    /// Lift a previous [`deny`](Self::deny)
    pub async fn allow(&self, uri: &str) {
        self.inner.tables.lock().await.denied.remove(uri);
    }

    /// Number of attached sessions
    pub async fn session_count(&self) -> usize {
        self.inner.tables.lock().await.sessions.len()
    }

    /// Number of active subscriptions across all sessions
    pub async fn subscription_count(&self) -> usize {
        self.inner.tables.lock().await.subscriptions.len()
    }

    /// Number of registered procedures
    pub async fn registration_count(&self) -> usize {
        self.inner.tables.lock().await.registrations.len()
    }

    /// Whether `procedure` currently has a callee
    pub async fn has_registration(&self, procedure: &str) -> bool {
        self.inner
            .tables
            .lock()
            .await
            .registrations
            .contains_key(procedure)
    }

    /// Topics subscribed by `session`, sorted
    pub async fn topics_for(&self, session: SessionId) -> Vec<String> {
        self.inner.tables.lock().await.subscriptions.topics_for(session)
    }

    fn not_authorized(uri: &str) -> Error {
        Error::protocol(
            "wamp.error.not_authorized",
            format!("not authorized to use '{uri}'"),
        )
    }

    pub(crate) async fn subscribe(
        &self,
        session: SessionId,
        topic: &str,
        handler: EventHandler,
        options: &Dict,
    ) -> Result<Subscription> {
        let policy = MatchPolicy::from_options(options)?;
        let mut tables = self.inner.tables.lock().await;
        if tables.denied.contains(topic) {
            return Err(Self::not_authorized(topic));
        }

        let id = self.next_id();
        tables.subscriptions.insert(
            id,
            SubscriptionEntry {
                topic: topic.to_string(),
                session,
                policy,
                handler,
            },
        );

        Ok(Subscription {
            id,
            topic: topic.to_string(),
            session,
        })
    }

    pub(crate) async fn unsubscribe(&self, session: SessionId, subscription: u64) -> Result<()> {
        if self
            .inner
            .tables
            .lock()
            .await
            .subscriptions
            .remove(session, subscription)
        {
            Ok(())
        } else {
            Err(Error::protocol(
                "wamp.error.no_such_subscription",
                format!("no subscription {subscription} for session {session}"),
            ))
        }
    }

    pub(crate) async fn publish(
        &self,
        session: SessionId,
        topic: &str,
        args: Vec<Value>,
        kwargs: Dict,
        options: &Dict,
    ) -> Result<Option<Publication>> {
        let exclude_me = flag(options, "exclude_me").unwrap_or(true);
        let acknowledge = flag(options, "acknowledge").unwrap_or(false);
        let disclose_me = flag(options, "disclose_me").unwrap_or(false);

        let publication = self.next_id();
        let handlers = self
            .inner
            .tables
            .lock()
            .await
            .subscriptions
            .matching(topic, exclude_me.then_some(session));

        tracing::trace!(topic = %topic, receivers = handlers.len(), "Publishing event");

        // Delivered in subscription order, one at a time, so events from one
        // publisher arrive in publish order
        for handler in handlers {
            handler(Event {
                args: args.clone(),
                kwargs: kwargs.clone(),
                details: EventDetails {
                    topic: topic.to_string(),
                    publication,
                    publisher: disclose_me.then_some(session),
                },
            })
            .await;
        }

        Ok(acknowledge.then_some(Publication { id: publication }))
    }

    pub(crate) async fn register(
        &self,
        session: SessionId,
        procedure: &str,
        handler: ProcedureHandler,
    ) -> Result<Registration> {
        let mut tables = self.inner.tables.lock().await;
        if tables.denied.contains(procedure) {
            return Err(Self::not_authorized(procedure));
        }
        if tables.registrations.contains_key(procedure) {
            return Err(Error::protocol(
                "wamp.error.procedure_already_exists",
                format!("procedure '{procedure}' is already registered"),
            ));
        }

        let id = self.next_id();
        tables.registrations.insert(
            procedure.to_string(),
            RegistrationEntry {
                id,
                session,
                handler,
            },
        );

        Ok(Registration {
            id,
            procedure: procedure.to_string(),
            session,
        })
    }

    pub(crate) async fn unregister(&self, session: SessionId, registration: &Registration) -> Result<()> {
        let mut tables = self.inner.tables.lock().await;
        match tables.registrations.get(&registration.procedure) {
            Some(entry) if entry.id == registration.id && entry.session == session => {
                tables.registrations.remove(&registration.procedure);
                Ok(())
            }
            _ => Err(Error::protocol(
                "wamp.error.no_such_registration",
                format!("no registration {} for session {session}", registration.id),
            )),
        }
    }

    pub(crate) async fn call(
        &self,
        session: SessionId,
        procedure: &str,
        args: Vec<Value>,
        options: &Dict,
    ) -> Result<Value> {
        let handler = self
            .inner
            .tables
            .lock()
            .await
            .registrations
            .get(procedure)
            .map(|r| Arc::clone(&r.handler))
            .ok_or_else(|| {
                Error::protocol(
                    "wamp.error.no_such_procedure",
                    format!("no callee registered for procedure '{procedure}'"),
                )
            })?;

        let disclose_me = flag(options, "disclose_me").unwrap_or(false);
        handler(Invocation {
            args,
            kwargs: Dict::new(),
            details: InvocationDetails {
                procedure: procedure.to_string(),
                caller: disclose_me.then_some(session),
            },
        })
        .await
    }
}

fn flag(options: &Dict, key: &str) -> Option<bool> {
    options.get(key).and_then(Value::as_bool)
}
