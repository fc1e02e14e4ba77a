//! Common test utilities for wampease-client integration tests
//!
//! Provides loopback fixtures and a small capture helper for observing
//! hooks and event handlers from inside a test.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use wampease_client::WampClient;
use wampease_core::FixedDelay;
use wampease_router::{LoopbackConnector, Router};

/// How long `Captured::wait_for` polls before failing the test
const WAIT_LIMIT: Duration = Duration::from_secs(2);

/// Router on the default realm
pub fn router() -> Router {
    Router::new("realm1")
}

/// Client whose connector never reconnects
pub fn client(router: &Router) -> WampClient {
    WampClient::new(LoopbackConnector::new(router.clone()))
}

/// Client whose connector reopens lost sessions after 10ms
pub fn reconnecting_client(router: &Router) -> WampClient {
    WampClient::new(
        LoopbackConnector::new(router.clone()).with_reconnect(FixedDelay::new(Duration::from_millis(10))),
    )
}

/// Connected client that never reconnects
pub async fn connected_client(router: &Router) -> WampClient {
    let client = client(router);
    client.connect(None).await.expect("connect");
    client
}

/// Connected client that reopens lost sessions
pub async fn connected_reconnecting_client(router: &Router) -> WampClient {
    let client = reconnecting_client(router);
    client.connect(None).await.expect("connect");
    client
}

/// Thread-safe list of values pushed from callbacks
pub struct Captured<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Captured<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T: Clone + Send + 'static> Captured<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, item: T) {
        self.items.lock().unwrap().push(item);
    }

    pub fn items(&self) -> Vec<T> {
        self.items.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    /// Poll until at least `count` items arrived
    pub async fn wait_for(&self, count: usize) -> Vec<T> {
        let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
        loop {
            if self.len() >= count {
                return self.items();
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("expected {count} items, got {:?}", self.len());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Poll `check` until it returns true
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while !check().await {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met in time");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
