//! Register request shapes and the two primitive session actions
//!
//! `register` accepts either one [`Procedure`] or a list of them; the
//! [`RegisterRequest`] enum makes the two shapes explicit.
//!
//! [`subscribe_once`] and [`register_one`] are the only places the facade
//! asks a session to subscribe or register. The caller-facing operations
//! and the recovery engine both go through them, so a replay behaves
//! exactly like the first request.

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use wampease_core::{
    procedure, Dict, EventHandler, FromArgs, ProcedureHandler, Registration, Result, Session,
    Subscription,
};

/// A named procedure ready to be registered
#[derive(Clone)]
pub struct Procedure {
    /// Procedure URI
    pub name: String,
    /// Adapted handler
    pub handler: ProcedureHandler,
}

impl Procedure {
    /// Adapt a positional closure into a procedure
    ///
    /// ```rust
    /// use wampease_client::Procedure;
    ///
    /// let add2 = Procedure::new("com.math.add2", |(a, b): (i64, i64)| async move { Ok(a + b) });
    /// assert_eq!(add2.name, "com.math.add2");
    /// ```
    pub fn new<T, F, Fut, R>(name: impl Into<String>, f: F) -> Self
    where
        T: FromArgs + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        Self {
            name: name.into(),
            handler: procedure(f),
        }
    }

    /// Use an already adapted handler
    pub fn from_handler(name: impl Into<String>, handler: ProcedureHandler) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure").field("name", &self.name).finish()
    }
}

/// One procedure or an ordered batch of them
#[derive(Debug, Clone)]
pub enum RegisterRequest {
    Single(Procedure),
    /// Registered one after another; stops at the first failure
    Batch(Vec<Procedure>),
}

impl From<Procedure> for RegisterRequest {
    fn from(procedure: Procedure) -> Self {
        RegisterRequest::Single(procedure)
    }
}

impl From<Vec<Procedure>> for RegisterRequest {
    fn from(procedures: Vec<Procedure>) -> Self {
        RegisterRequest::Batch(procedures)
    }
}

/// Subscribe `handler` to `topic` on `session`
pub(crate) async fn subscribe_once(
    session: &Arc<dyn Session>,
    topic: &str,
    handler: EventHandler,
    options: Dict,
) -> Result<Subscription> {
    let subscription = session.subscribe(topic, handler, options).await?;
    tracing::debug!(
        topic = %topic,
        subscription_id = subscription.id,
        session_id = session.id(),
        "Subscribed"
    );
    Ok(subscription)
}

/// Register `handler` as `name` on `session`
pub(crate) async fn register_one(
    session: &Arc<dyn Session>,
    name: &str,
    handler: ProcedureHandler,
    options: Dict,
) -> Result<Registration> {
    let registration = session.register(name, handler, options).await?;
    tracing::debug!(
        procedure = %name,
        registration_id = registration.id,
        session_id = session.id(),
        "Registered"
    );
    Ok(registration)
}
