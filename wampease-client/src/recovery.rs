//! Recovery engine
//!
//! After the transport reopens a lost session, every tracked subscription
//! and registration is replayed on the new session: subscriptions first,
//! then registrations, each in the order the caller made them, using the
//! options current at replay time.
//!
//! Items are isolated from one another. A failed replay is reported through
//! the error hook as [`Error::Recovery`] and the pass moves on; the entry
//! stays tracked so the next reconnect tries it again. A successful replay
//! replaces the entry's handle, so unsubscribe and unregister keep working.
//! An entry the caller removes while the pass is running is not brought back,
//! and one the caller removes and adds again keeps the caller's new handle;
//! in both cases the replayed handle is cancelled.

use crate::hooks::LifecycleHooks;
use crate::registry::OperationRegistry;
use crate::request::{register_one, subscribe_once};
use std::sync::Arc;
use wampease_core::{Error, OperationKind, Options, Result, Session};

/// Outcome of one recovery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Subscriptions restored
    pub subscriptions: usize,
    /// Registrations restored
    pub registrations: usize,
    /// Items that could not be restored
    pub failed: usize,
}

impl RecoveryReport {
    /// Whether every tracked item was restored
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Replay every tracked operation on `session`
///
/// Fails only when the pass cannot start at all; per-item failures go to
/// the error hook and are counted in the report.
pub(crate) async fn replay(
    registry: &OperationRegistry,
    hooks: &LifecycleHooks,
    session: &Arc<dyn Session>,
    options: &Options,
) -> Result<RecoveryReport> {
    if !session.is_open() {
        return Err(Error::NotConnected);
    }

    let mut report = RecoveryReport::default();

    let subscriptions = registry.subscriptions.lock().await.snapshot();
    for (topic, entry) in subscriptions {
        match subscribe_once(session, &topic, entry.handler, options.subscribe.clone()).await {
            Ok(handle) => {
                let kept = registry
                    .subscriptions
                    .lock()
                    .await
                    .update_handle(&topic, entry.generation, handle.clone());
                if kept {
                    report.subscriptions += 1;
                } else {
                    tracing::debug!(topic = %topic, "Removed or replaced during recovery, cancelling replay");
                    let _ = session.unsubscribe(&handle).await;
                }
            }
            Err(e) => {
                report.failed += 1;
                let error = Error::recovery(OperationKind::Subscription, &topic, e);
                tracing::warn!(topic = %topic, error = %error, "Failed to restore subscription");
                hooks.error(&error).await;
            }
        }
    }

    let registrations = registry.registrations.lock().await.snapshot();
    for (name, entry) in registrations {
        match register_one(session, &name, entry.handler, options.register.clone()).await {
            Ok(handle) => {
                let kept = registry
                    .registrations
                    .lock()
                    .await
                    .update_handle(&name, entry.generation, handle.clone());
                if kept {
                    report.registrations += 1;
                } else {
                    tracing::debug!(procedure = %name, "Removed or replaced during recovery, cancelling replay");
                    let _ = session.unregister(&handle).await;
                }
            }
            Err(e) => {
                report.failed += 1;
                let error = Error::recovery(OperationKind::Registration, &name, e);
                tracing::warn!(procedure = %name, error = %error, "Failed to restore registration");
                hooks.error(&error).await;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;
    use wampease_core::{
        procedure, raw_event_handler, Dict, EventHandler, ProcedureHandler, Publication,
        Registration, SessionId, Subscription,
    };
    use wampease_router::{LoopbackSession, Router};

    /// Session that lets the caller act on the registry while a replay for
    /// `com.a` or `com.proc` is in flight
    struct CallerMeanwhile {
        inner: LoopbackSession,
        registry: OperationRegistry,
        fresh: EventHandler,
    }

    #[async_trait]
    impl Session for CallerMeanwhile {
        fn id(&self) -> SessionId {
            self.inner.id()
        }

        fn realm(&self) -> &str {
            self.inner.realm()
        }

        fn is_open(&self) -> bool {
            self.inner.is_open()
        }

        async fn call(&self, procedure: &str, args: Vec<Value>, options: Dict) -> Result<Value> {
            self.inner.call(procedure, args, options).await
        }

        async fn publish(
            &self,
            topic: &str,
            args: Vec<Value>,
            kwargs: Dict,
            options: Dict,
        ) -> Result<Option<Publication>> {
            self.inner.publish(topic, args, kwargs, options).await
        }

        async fn subscribe(
            &self,
            topic: &str,
            handler: EventHandler,
            options: Dict,
        ) -> Result<Subscription> {
            let replayed = self.inner.subscribe(topic, handler, options.clone()).await?;
            if topic == "com.a" {
                // Unsubscribe of the stale handle only drops the entry,
                // then a new subscribe goes through
                self.registry.subscriptions.lock().await.delete(topic);
                let fresh = self
                    .inner
                    .subscribe(topic, Arc::clone(&self.fresh), options)
                    .await?;
                self.registry
                    .subscriptions
                    .lock()
                    .await
                    .put(topic, Arc::clone(&self.fresh), fresh);
            }
            Ok(replayed)
        }

        async fn unsubscribe(&self, subscription: &Subscription) -> Result<()> {
            self.inner.unsubscribe(subscription).await
        }

        async fn register(
            &self,
            procedure: &str,
            handler: ProcedureHandler,
            options: Dict,
        ) -> Result<Registration> {
            let replayed = self.inner.register(procedure, handler, options).await?;
            self.registry.registrations.lock().await.delete(procedure);
            Ok(replayed)
        }

        async fn unregister(&self, registration: &Registration) -> Result<()> {
            self.inner.unregister(registration).await
        }
    }

    async fn tracked(router: &Router) -> OperationRegistry {
        let (session, _lost) = router.attach("realm1").await.unwrap();
        let session: Arc<dyn Session> = Arc::new(session);
        let registry = OperationRegistry::new();

        for topic in ["com.a", "com.b"] {
            let handler = raw_event_handler(|_| async {});
            let handle = subscribe_once(&session, topic, handler.clone(), Dict::new())
                .await
                .unwrap();
            registry.subscriptions.lock().await.put(topic, handler, handle);
        }
        let handler = procedure(|(): ()| async { Ok(1) });
        let handle = register_one(&session, "com.proc", handler.clone(), Dict::new())
            .await
            .unwrap();
        registry
            .registrations
            .lock()
            .await
            .put("com.proc", handler, handle);

        registry
    }

    #[tokio::test]
    async fn test_replay_restores_everything() {
        let router = Router::new("realm1");
        let registry = tracked(&router).await;
        router.drop_sessions().await;

        let (session, _lost) = router.attach("realm1").await.unwrap();
        let session_id = session.id();
        let session: Arc<dyn Session> = Arc::new(session);

        let report = replay(&registry, &LifecycleHooks::new(), &session, &Options::default())
            .await
            .unwrap();

        assert_eq!(
            report,
            RecoveryReport {
                subscriptions: 2,
                registrations: 1,
                failed: 0
            }
        );
        assert!(report.is_complete());
        assert_eq!(router.topics_for(session_id).await, vec!["com.a", "com.b"]);
        assert!(router.has_registration("com.proc").await);

        // Handles now point at the new session
        let entry = registry.subscription("com.a").await.unwrap();
        assert_eq!(entry.handle.session, session_id);
    }

    #[tokio::test]
    async fn test_replay_isolates_failures() {
        let router = Router::new("realm1");
        let registry = tracked(&router).await;
        router.drop_sessions().await;
        router.deny("com.a").await;

        let hooks = LifecycleHooks::new();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        hooks
            .set_on_error(move |e| sink.lock().unwrap().push(e.clone()))
            .await;

        let (session, _lost) = router.attach("realm1").await.unwrap();
        let session: Arc<dyn Session> = Arc::new(session);
        let report = replay(&registry, &hooks, &session, &Options::default())
            .await
            .unwrap();

        assert_eq!(report.subscriptions, 1);
        assert_eq!(report.registrations, 1);
        assert_eq!(report.failed, 1);

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            Error::Recovery { kind, name, source } => {
                assert_eq!(*kind, OperationKind::Subscription);
                assert_eq!(name, "com.a");
                assert_eq!(source.uri(), "wamp.error.not_authorized");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // The failed entry stays tracked for the next reconnect
        assert!(registry.is_subscribed("com.a").await);
    }

    #[tokio::test]
    async fn test_replay_requires_open_session() {
        let router = Router::new("realm1");
        let registry = OperationRegistry::new();
        let (session, _lost) = router.attach("realm1").await.unwrap();
        router.detach(session.id()).await;
        let session: Arc<dyn Session> = Arc::new(session);

        let err = replay(&registry, &LifecycleHooks::new(), &session, &Options::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn test_replay_keeps_caller_changes_made_meanwhile() {
        let router = Router::new("realm1");
        let registry = tracked(&router).await;
        router.drop_sessions().await;

        let hits = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&hits);
        let fresh = raw_event_handler(move |_| {
            let sink = Arc::clone(&sink);
            async move { *sink.lock().unwrap() += 1 }
        });

        let (inner, _lost) = router.attach("realm1").await.unwrap();
        let session_id = inner.id();
        let session: Arc<dyn Session> = Arc::new(CallerMeanwhile {
            inner,
            registry: registry.clone(),
            fresh,
        });

        let report = replay(&registry, &LifecycleHooks::new(), &session, &Options::default())
            .await
            .unwrap();

        // com.a now belongs to the caller's new subscription, com.proc is gone
        assert_eq!(
            report,
            RecoveryReport {
                subscriptions: 1,
                registrations: 0,
                failed: 0
            }
        );
        assert_eq!(router.topics_for(session_id).await, vec!["com.a", "com.b"]);
        assert!(!router.has_registration("com.proc").await);
        assert!(!registry.is_registered("com.proc").await);

        let (publisher, _lost) = router.attach("realm1").await.unwrap();
        publisher
            .publish("com.a", Vec::new(), Dict::new(), Dict::new())
            .await
            .unwrap();
        assert_eq!(*hits.lock().unwrap(), 1);

        let entry = registry.subscription("com.a").await.unwrap();
        session.unsubscribe(&entry.handle).await.unwrap();
        assert_eq!(router.topics_for(session_id).await, vec!["com.b"]);
    }
}
