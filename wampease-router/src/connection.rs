//! Loopback transport between a client and an in-process [`Router`]
//!
//! [`LoopbackConnector`] builds [`LoopbackConnection`]s; each one drives a
//! single background task through this lifecycle:
//!
//! 1. **Attach**: join the configured realm on the router
//! 2. **Serve**: emit `Opened`, then wait for loss or a close request
//! 3. **Retry** (optional): on loss or refusal, ask the reconnection
//!    strategy for a delay, emit `Closed` with `will_retry` set, sleep and
//!    go back to step 1
//! 4. **Finish**: emit the final `Closed` (`will_retry == false`) and end
//!    the event stream
//!
//! An unknown realm is never retried. Without a strategy every loss is
//! final.

use crate::router::Router;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use wampease_core::{
    CloseDetails, CloseEvent, CloseReason, ConnectOptions, Connection, ConnectionEvent,
    ConnectionEvents, Connector, Error, ReconnectionStrategy, Result, Session,
};

const CLOSE_NORMAL: &str = "wamp.close.normal";

type StrategyFactory = Arc<dyn Fn() -> Box<dyn ReconnectionStrategy> + Send + Sync>;

/// Builds loopback connections to one router
#[derive(Clone)]
pub struct LoopbackConnector {
    router: Router,
    strategy: Option<StrategyFactory>,
}

impl LoopbackConnector {
    /// Connector whose connections never reopen on their own
    pub fn new(router: Router) -> Self {
        Self {
            router,
            strategy: None,
        }
    }

    /// Reopen lost sessions according to `strategy`
    ///
    /// Each connection gets its own copy, so backoff state is never shared.
    pub fn with_reconnect<S>(mut self, strategy: S) -> Self
    where
        S: ReconnectionStrategy + Clone + 'static,
    {
        self.strategy = Some(Arc::new(move || Box::new(strategy.clone())));
        self
    }

    /// Router this connector attaches to
    pub fn router(&self) -> &Router {
        &self.router
    }
}

impl Connector for LoopbackConnector {
    fn connect(&self, config: &ConnectOptions) -> Result<Arc<dyn Connection>> {
        let strategy = self.strategy.as_ref().map(|make| make());
        Ok(Arc::new(LoopbackConnection::new(
            self.router.clone(),
            config.clone(),
            strategy,
        )))
    }
}

#[derive(Default)]
struct CloseRequest {
    reason: Option<String>,
    message: Option<String>,
}

/// State shared between a connection handle and its background task
struct Link {
    router: Router,
    config: ConnectOptions,
    running: AtomicBool,
    current: Mutex<Option<Arc<dyn Session>>>,
    close_request: Mutex<Option<CloseRequest>>,
    shutdown: Notify,
}

impl Link {
    fn set_current(&self, session: Option<Arc<dyn Session>>) {
        if let Ok(mut current) = self.current.lock() {
            *current = session;
        }
    }

    fn take_close_request(&self) -> CloseRequest {
        self.close_request
            .lock()
            .ok()
            .and_then(|mut request| request.take())
            .unwrap_or_default()
    }

    fn closed_by_request(&self, retry_count: u32) -> CloseEvent {
        let request = self.take_close_request();
        CloseEvent {
            reason: CloseReason::Closed,
            details: CloseDetails {
                reason: request.reason.or_else(|| Some(CLOSE_NORMAL.to_string())),
                message: request.message,
                will_retry: false,
                retry_count,
                retry_delay: None,
            },
        }
    }
}

/// One loopback connection
pub struct LoopbackConnection {
    link: Arc<Link>,
    strategy: Mutex<Option<Box<dyn ReconnectionStrategy>>>,
    started: AtomicBool,
}

impl LoopbackConnection {
    fn new(
        router: Router,
        config: ConnectOptions,
        strategy: Option<Box<dyn ReconnectionStrategy>>,
    ) -> Self {
        Self {
            link: Arc::new(Link {
                router,
                config,
                running: AtomicBool::new(false),
                current: Mutex::new(None),
                close_request: Mutex::new(None),
                shutdown: Notify::new(),
            }),
            strategy: Mutex::new(strategy),
            started: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Connection for LoopbackConnection {
    fn open(&self) -> Result<ConnectionEvents> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::Internal("connection was already opened".to_string()));
        }

        let strategy = self
            .strategy
            .lock()
            .map_err(|_| Error::Internal("strategy lock poisoned".to_string()))?
            .take();

        let (tx, rx) = mpsc::unbounded_channel();
        self.link.running.store(true, Ordering::SeqCst);
        tokio::spawn(drive(Arc::clone(&self.link), strategy, tx));
        Ok(rx)
    }

    async fn close(&self, reason: Option<String>, message: Option<String>) -> Result<()> {
        if !self.link.running.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }

        if let Ok(mut request) = self.link.close_request.lock() {
            *request = Some(CloseRequest { reason, message });
        }
        self.link.shutdown.notify_one();
        Ok(())
    }

    fn session(&self) -> Option<Arc<dyn Session>> {
        self.link.current.lock().ok().and_then(|s| s.clone())
    }
}

/// Outcome of one attach-and-serve round
enum Round {
    /// The session ended or never opened; maybe retry
    Ended { close: CloseEvent, retryable: bool },
    /// A close was requested or nobody is listening any more
    Stop,
}

#[tracing::instrument(skip_all, fields(realm = %link.config.realm))]
async fn drive(
    link: Arc<Link>,
    mut strategy: Option<Box<dyn ReconnectionStrategy>>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let mut attempt: u32 = 0;

    loop {
        let (mut close, retryable) = match serve_once(&link, &mut strategy, &events, attempt).await {
            Round::Ended { close, retryable } => (close, retryable),
            Round::Stop => break,
        };

        if close.reason == CloseReason::Lost {
            attempt = 0;
        }

        let delay = if retryable {
            strategy.as_mut().and_then(|s| s.next_delay(attempt))
        } else {
            None
        };

        close.details.will_retry = delay.is_some();
        close.details.retry_count = attempt;
        close.details.retry_delay = delay;

        tracing::info!(
            reason = %close.reason,
            will_retry = close.details.will_retry,
            attempt,
            "Loopback connection closed"
        );

        if events.send(ConnectionEvent::Closed(close)).is_err() {
            break;
        }

        let Some(delay) = delay else {
            break;
        };
        attempt = attempt.saturating_add(1);

        if wait_or_shutdown(&link, delay).await {
            let _ = events.send(ConnectionEvent::Closed(link.closed_by_request(attempt)));
            break;
        }
    }

    link.set_current(None);
    link.running.store(false, Ordering::SeqCst);
}

async fn serve_once(
    link: &Link,
    strategy: &mut Option<Box<dyn ReconnectionStrategy>>,
    events: &mpsc::UnboundedSender<ConnectionEvent>,
    attempt: u32,
) -> Round {
    let (session, lost) = match link.router.attach(&link.config.realm).await {
        Ok(attached) => attached,
        Err(e) => {
            // A missing realm will not appear by retrying
            let retryable = e.uri() != "wamp.error.no_such_realm";
            tracing::debug!(error = %e, attempt, "Attach failed");
            return Round::Ended {
                close: CloseEvent {
                    reason: CloseReason::Unreachable,
                    details: CloseDetails {
                        reason: Some(e.uri().to_string()),
                        message: Some(e.to_string()),
                        ..Default::default()
                    },
                },
                retryable,
            };
        }
    };

    if let Some(strategy) = strategy.as_mut() {
        strategy.reset();
    }

    let session_id = session.id();
    let session: Arc<dyn Session> = Arc::new(session);
    link.set_current(Some(Arc::clone(&session)));
    tracing::info!(session_id, "Loopback session opened");

    if events.send(ConnectionEvent::Opened(session)).is_err() {
        link.set_current(None);
        link.router.detach(session_id).await;
        return Round::Stop;
    }

    tokio::select! {
        lost = lost => {
            link.set_current(None);
            Round::Ended {
                close: CloseEvent {
                    reason: CloseReason::Lost,
                    details: lost.unwrap_or_default(),
                },
                retryable: true,
            }
        }
        _ = link.shutdown.notified() => {
            link.set_current(None);
            link.router.detach(session_id).await;
            let _ = events.send(ConnectionEvent::Closed(link.closed_by_request(0)));
            Round::Stop
        }
    }
}

/// Sleep for `delay`; returns `true` if a close was requested meanwhile
async fn wait_or_shutdown(link: &Link, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = link.shutdown.notified() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wampease_core::{FixedDelay, NoReconnect};

    fn connector(router: &Router) -> LoopbackConnector {
        LoopbackConnector::new(router.clone())
    }

    #[tokio::test]
    async fn test_open_emits_opened() {
        let router = Router::new("realm1");
        let connection = connector(&router)
            .connect(&ConnectOptions::default())
            .unwrap();
        let mut events = connection.open().unwrap();

        match events.recv().await {
            Some(ConnectionEvent::Opened(session)) => assert_eq!(session.realm(), "realm1"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(connection.is_open());
        assert_eq!(router.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_open_twice_fails() {
        let router = Router::new("realm1");
        let connection = connector(&router)
            .connect(&ConnectOptions::default())
            .unwrap();
        let _events = connection.open().unwrap();
        assert!(connection.open().is_err());
    }

    #[tokio::test]
    async fn test_unknown_realm_is_final() {
        let router = Router::new("realm1");
        let connection = connector(&router)
            .with_reconnect(FixedDelay::new(Duration::from_millis(5)))
            .connect(&ConnectOptions::new("ws://loopback", "nope"))
            .unwrap();
        let mut events = connection.open().unwrap();

        match events.recv().await {
            Some(ConnectionEvent::Closed(close)) => {
                assert_eq!(close.reason, CloseReason::Unreachable);
                assert!(!close.details.will_retry);
                assert_eq!(
                    close.details.reason.as_deref(),
                    Some("wamp.error.no_such_realm")
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_request_ends_stream() {
        let router = Router::new("realm1");
        let connection = connector(&router)
            .connect(&ConnectOptions::default())
            .unwrap();
        let mut events = connection.open().unwrap();
        assert!(matches!(events.recv().await, Some(ConnectionEvent::Opened(_))));

        connection
            .close(Some("wamp.close.goodbye".into()), Some("bye".into()))
            .await
            .unwrap();

        match events.recv().await {
            Some(ConnectionEvent::Closed(close)) => {
                assert_eq!(close.reason, CloseReason::Closed);
                assert_eq!(close.details.reason.as_deref(), Some("wamp.close.goodbye"));
                assert_eq!(close.details.message.as_deref(), Some("bye"));
                assert!(!close.details.will_retry);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(events.recv().await.is_none());
        assert_eq!(router.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_loss_without_strategy_is_final() {
        let router = Router::new("realm1");
        let connection = connector(&router)
            .with_reconnect(NoReconnect)
            .connect(&ConnectOptions::default())
            .unwrap();
        let mut events = connection.open().unwrap();
        assert!(matches!(events.recv().await, Some(ConnectionEvent::Opened(_))));

        router.drop_sessions().await;

        match events.recv().await {
            Some(ConnectionEvent::Closed(close)) => {
                assert_eq!(close.reason, CloseReason::Lost);
                assert!(!close.details.will_retry);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_loss_with_strategy_reopens() {
        let router = Router::new("realm1");
        let connection = connector(&router)
            .with_reconnect(FixedDelay::new(Duration::from_millis(5)))
            .connect(&ConnectOptions::default())
            .unwrap();
        let mut events = connection.open().unwrap();

        let first = match events.recv().await {
            Some(ConnectionEvent::Opened(session)) => session.id(),
            other => panic!("unexpected event: {other:?}"),
        };

        router.drop_sessions().await;

        match events.recv().await {
            Some(ConnectionEvent::Closed(close)) => {
                assert_eq!(close.reason, CloseReason::Lost);
                assert!(close.details.will_retry);
                assert_eq!(close.details.retry_delay, Some(Duration::from_millis(5)));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        match events.recv().await {
            Some(ConnectionEvent::Opened(session)) => assert_ne!(session.id(), first),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_while_retrying() {
        let router = Router::new("realm1");
        router.set_available(false);
        let connection = connector(&router)
            .with_reconnect(FixedDelay::new(Duration::from_secs(60)))
            .connect(&ConnectOptions::default())
            .unwrap();
        let mut events = connection.open().unwrap();

        match events.recv().await {
            Some(ConnectionEvent::Closed(close)) => {
                assert_eq!(close.reason, CloseReason::Unreachable);
                assert!(close.details.will_retry);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        connection.close(None, None).await.unwrap();

        match events.recv().await {
            Some(ConnectionEvent::Closed(close)) => {
                assert_eq!(close.reason, CloseReason::Closed);
                assert!(!close.details.will_retry);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_when_not_running() {
        let router = Router::new("realm1");
        let connection = connector(&router)
            .connect(&ConnectOptions::default())
            .unwrap();
        let err = connection.close(None, None).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }
}
