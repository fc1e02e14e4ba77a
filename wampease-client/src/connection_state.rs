//! Connection state management
//!
//! Owns the current connection handle, the current session handle and the
//! facade's view of where the connection is in its lifecycle.
//!
//! # Connection States
//!
//! - **Disconnected**: no connection; `connect` may be called
//! - **Connecting**: a connection was opened and no session exists yet
//! - **Connected**: a session is open
//! - **Reconnecting**: the session was lost and the transport will reopen it
//!
//! # State Transitions
//!
//! ```text
//! Disconnected → Connecting → Connected ⇄ Reconnecting
//!       ↑             │            │            │
//!       └─────────────┴────────────┴────────────┘  (final close)
//! ```
//!
//! The session handle is present exactly while the state is `Connected`.

use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use wampease_core::{Connection, Error, Result, Session};

/// Connection state as seen by the facade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Connection opened, waiting for the first session
    Connecting,
    /// A session is open
    Connected,
    /// Session lost; the transport is reopening it
    Reconnecting,
}

impl ConnectionState {
    /// Numeric form used by the connection state gauge
    pub fn as_gauge(self) -> i64 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Reconnecting => 3,
        }
    }
}

/// Holds the connection and session handles and the lifecycle state
pub struct SessionManager {
    state: RwLock<ConnectionState>,
    connection: RwLock<Option<Arc<dyn Connection>>>,
    session: RwLock<Option<Arc<dyn Session>>>,
    /// Number of final closes so far
    closes: watch::Sender<u64>,
}

impl SessionManager {
    pub fn new() -> Self {
        let (closes, _) = watch::channel(0);
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            connection: RwLock::new(None),
            session: RwLock::new(None),
            closes,
        }
    }

    /// Get the current connection state
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Claim the manager for a new connection
    ///
    /// Fails with `AlreadyConnected` unless the state is `Disconnected`.
    pub(crate) async fn begin_connect(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != ConnectionState::Disconnected {
            return Err(Error::AlreadyConnected);
        }
        *state = ConnectionState::Connecting;
        Ok(())
    }

    pub(crate) async fn set_connection(&self, connection: Arc<dyn Connection>) {
        *self.connection.write().await = Some(connection);
    }

    /// Undo `begin_connect` when the connection could not even be opened
    pub(crate) async fn abort_connect(&self) {
        *self.connection.write().await = None;
        *self.state.write().await = ConnectionState::Disconnected;
    }

    pub(crate) async fn opened(&self, session: Arc<dyn Session>) {
        *self.session.write().await = Some(session);
        *self.state.write().await = ConnectionState::Connected;
    }

    /// Record a close and return the state it leads to
    ///
    /// A final close only drops the session here; the state moves to
    /// `Disconnected` in [`finish`](Self::finish), once the close hook ran.
    pub(crate) async fn closed(&self, will_retry: bool, ever_opened: bool) -> ConnectionState {
        *self.session.write().await = None;

        let next = match (will_retry, ever_opened) {
            (false, _) => ConnectionState::Disconnected,
            (true, true) => ConnectionState::Reconnecting,
            (true, false) => ConnectionState::Connecting,
        };

        if next != ConnectionState::Disconnected {
            *self.state.write().await = next;
        }
        next
    }

    /// Drop both handles, go to `Disconnected` and wake close watchers
    pub(crate) async fn finish(&self) {
        *self.session.write().await = None;
        *self.connection.write().await = None;
        *self.state.write().await = ConnectionState::Disconnected;
        self.closes.send_modify(|n| *n += 1);
    }

    /// Receiver whose `changed()` resolves at the next final close
    ///
    /// Take it before reading the connection: a close finishing anywhere
    /// after this call is observed, even one that lands before `changed()`
    /// is awaited.
    pub(crate) fn watch_close(&self) -> watch::Receiver<u64> {
        self.closes.subscribe()
    }

    /// The open session, or `NotConnected`
    pub async fn session(&self) -> Result<Arc<dyn Session>> {
        self.session.read().await.clone().ok_or(Error::NotConnected)
    }

    /// The current connection, or `NotConnected`
    pub async fn connection(&self) -> Result<Arc<dyn Connection>> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or(Error::NotConnected)
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_state() {
        let manager = SessionManager::new();
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
        assert!(matches!(manager.session().await, Err(Error::NotConnected)));
        assert!(matches!(manager.connection().await, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_begin_connect_only_once() {
        let manager = SessionManager::new();
        manager.begin_connect().await.unwrap();
        assert_eq!(manager.state().await, ConnectionState::Connecting);
        assert!(matches!(
            manager.begin_connect().await,
            Err(Error::AlreadyConnected)
        ));

        manager.abort_connect().await;
        assert!(manager.begin_connect().await.is_ok());
    }

    #[tokio::test]
    async fn test_close_transitions() {
        let manager = SessionManager::new();
        manager.begin_connect().await.unwrap();

        assert_eq!(manager.closed(true, false).await, ConnectionState::Connecting);
        assert_eq!(manager.closed(true, true).await, ConnectionState::Reconnecting);
        assert_eq!(manager.state().await, ConnectionState::Reconnecting);
        assert_eq!(manager.closed(false, true).await, ConnectionState::Disconnected);
        assert!(matches!(manager.session().await, Err(Error::NotConnected)));

        manager.finish().await;
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_final_close_wakes_watchers() {
        let manager = SessionManager::new();
        let mut closed = manager.watch_close();
        manager.finish().await;
        assert!(closed.changed().await.is_ok());
    }

    #[tokio::test]
    async fn test_close_finished_before_waiting_is_seen() {
        let manager = SessionManager::new();
        manager.begin_connect().await.unwrap();

        let mut closed = manager.watch_close();
        // The final close lands between taking the watch and awaiting it
        manager.finish().await;
        assert!(matches!(manager.connection().await, Err(Error::NotConnected)));

        let waited =
            tokio::time::timeout(std::time::Duration::from_secs(1), closed.changed()).await;
        assert!(matches!(waited, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_watch_ignores_earlier_closes() {
        let manager = SessionManager::new();
        manager.finish().await;

        let mut closed = manager.watch_close();
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(20), closed.changed()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn test_gauge_values() {
        assert_eq!(ConnectionState::Disconnected.as_gauge(), 0);
        assert_eq!(ConnectionState::Connected.as_gauge(), 2);
        assert_eq!(ConnectionState::Reconnecting.as_gauge(), 3);
    }
}
