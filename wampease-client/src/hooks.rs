//! Lifecycle event hub
//!
//! Four replaceable callback slots the facade fires as the connection moves
//! through its lifecycle:
//!
//! - **open**: a session was established (first open and every reopen)
//! - **close**: the connection closed, with reason and details
//! - **recover**: a recovery pass finished, with its counts
//! - **error**: a single recovery item failed, or recovery could not run
//!
//! Every slot starts as a no-op. Setting a slot replaces the previous
//! callback. Callbacks are synchronous and run on the facade's event task,
//! so they should hand long work off to a spawned task.

use crate::recovery::RecoveryReport;
use std::sync::Arc;
use tokio::sync::RwLock;
use wampease_core::{CloseEvent, Error, Session};

/// Callback for the open slot
pub type OpenHook = Arc<dyn Fn(Arc<dyn Session>) + Send + Sync>;
/// Callback for the close slot
pub type CloseHook = Arc<dyn Fn(&CloseEvent) + Send + Sync>;
/// Callback for the recover slot
pub type RecoverHook = Arc<dyn Fn(&RecoveryReport) + Send + Sync>;
/// Callback for the error slot
pub type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;

/// The four hook slots
///
/// Cheap to clone; clones share the same slots.
#[derive(Clone)]
pub struct LifecycleHooks {
    on_open: Arc<RwLock<OpenHook>>,
    on_close: Arc<RwLock<CloseHook>>,
    on_recover: Arc<RwLock<RecoverHook>>,
    on_error: Arc<RwLock<ErrorHook>>,
}

impl LifecycleHooks {
    /// All slots set to no-ops
    pub fn new() -> Self {
        let on_open: OpenHook = Arc::new(|_| {});
        let on_close: CloseHook = Arc::new(|_| {});
        let on_recover: RecoverHook = Arc::new(|_| {});
        let on_error: ErrorHook = Arc::new(|_| {});
        Self {
            on_open: Arc::new(RwLock::new(on_open)),
            on_close: Arc::new(RwLock::new(on_close)),
            on_recover: Arc::new(RwLock::new(on_recover)),
            on_error: Arc::new(RwLock::new(on_error)),
        }
    }

    pub async fn set_on_open<F>(&self, hook: F)
    where
        F: Fn(Arc<dyn Session>) + Send + Sync + 'static,
    {
        *self.on_open.write().await = Arc::new(hook);
    }

    pub async fn set_on_close<F>(&self, hook: F)
    where
        F: Fn(&CloseEvent) + Send + Sync + 'static,
    {
        *self.on_close.write().await = Arc::new(hook);
    }

    pub async fn set_on_recover<F>(&self, hook: F)
    where
        F: Fn(&RecoveryReport) + Send + Sync + 'static,
    {
        *self.on_recover.write().await = Arc::new(hook);
    }

    pub async fn set_on_error<F>(&self, hook: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        *self.on_error.write().await = Arc::new(hook);
    }

    // Each dispatch clones the callback out so the slot is unlocked while it
    // runs; a callback may replace any slot, including its own.

    pub(crate) async fn open(&self, session: Arc<dyn Session>) {
        let hook = Arc::clone(&*self.on_open.read().await);
        hook(session);
    }

    pub(crate) async fn close(&self, event: &CloseEvent) {
        let hook = Arc::clone(&*self.on_close.read().await);
        hook(event);
    }

    pub(crate) async fn recover(&self, report: &RecoveryReport) {
        let hook = Arc::clone(&*self.on_recover.read().await);
        hook(report);
    }

    pub(crate) async fn error(&self, error: &Error) {
        let hook = Arc::clone(&*self.on_error.read().await);
        hook(error);
    }
}

impl Default for LifecycleHooks {
    fn default() -> Self {
        Self::new()
    }
}
