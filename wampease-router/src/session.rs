//! Session handle handed out by the loopback router

use crate::router::Router;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wampease_core::{
    Dict, Error, EventHandler, ProcedureHandler, Publication, Registration, Result, Session,
    SessionId, Subscription,
};

/// A session attached to a [`Router`]
///
/// Every action fails with [`Error::NotConnected`] once the session has left
/// the realm or was dropped by the router.
pub struct LoopbackSession {
    id: SessionId,
    realm: String,
    router: Router,
    open: Arc<AtomicBool>,
}

impl LoopbackSession {
    pub(crate) fn new(id: SessionId, realm: &str, router: Router, open: Arc<AtomicBool>) -> Self {
        Self {
            id,
            realm: realm.to_string(),
            router,
            open,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

#[async_trait]
impl Session for LoopbackSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn realm(&self) -> &str {
        &self.realm
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn call(&self, procedure: &str, args: Vec<Value>, options: Dict) -> Result<Value> {
        self.ensure_open()?;
        self.router.call(self.id, procedure, args, &options).await
    }

    async fn publish(
        &self,
        topic: &str,
        args: Vec<Value>,
        kwargs: Dict,
        options: Dict,
    ) -> Result<Option<Publication>> {
        self.ensure_open()?;
        self.router
            .publish(self.id, topic, args, kwargs, &options)
            .await
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: EventHandler,
        options: Dict,
    ) -> Result<Subscription> {
        self.ensure_open()?;
        self.router.subscribe(self.id, topic, handler, &options).await
    }

    async fn unsubscribe(&self, subscription: &Subscription) -> Result<()> {
        self.ensure_open()?;
        self.router.unsubscribe(self.id, subscription.id).await
    }

    async fn register(
        &self,
        procedure: &str,
        handler: ProcedureHandler,
        _options: Dict,
    ) -> Result<Registration> {
        self.ensure_open()?;
        self.router.register(self.id, procedure, handler).await
    }

    async fn unregister(&self, registration: &Registration) -> Result<()> {
        self.ensure_open()?;
        self.router.unregister(self.id, registration).await
    }
}
