//! Operation registry
//!
//! Tracks every subscription and registration the caller has made so they
//! can be replayed after a reconnect. Two independent stores, one keyed by
//! topic and one keyed by procedure name, each remembering the caller's
//! handler and the live handle the session returned.
//!
//! # Ordering
//!
//! Entries are kept in insertion order; snapshots and listings follow it, so
//! recovery replays operations in the order the caller made them.
//!
//! # Reservations
//!
//! A key is reserved before the session is asked to subscribe or register
//! and committed once the session answers. A second request for the same
//! key while the first is still in flight is rejected, so one key never has
//! two live handles.
//!
//! # Generations
//!
//! Every `put` stamps the entry with a fresh generation. Recovery swaps a
//! replayed handle in only while the entry still carries the generation it
//! snapshotted; an entry that was removed and added again in the meantime
//! belongs to the caller's newer request and is left alone.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use wampease_core::{EventHandler, ProcedureHandler, Registration, Subscription};

/// A tracked operation: the caller's handler and the live session handle
#[derive(Clone)]
pub struct Entry<H, T> {
    /// Handler as supplied by the caller (already adapted)
    pub handler: H,
    /// Handle from the most recent successful subscribe or register
    pub handle: T,
    pub(crate) generation: u64,
}

/// Insertion-ordered keyed store with in-flight reservations
pub(crate) struct Store<H, T> {
    entries: HashMap<String, Entry<H, T>>,
    order: Vec<String>,
    pending: HashSet<String>,
    next_generation: u64,
}

impl<H: Clone, T: Clone> Store<H, T> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            pending: HashSet::new(),
            next_generation: 0,
        }
    }

    /// Claim `key` for an in-flight operation; `false` if taken
    pub(crate) fn reserve(&mut self, key: &str) -> bool {
        if self.entries.contains_key(key) || self.pending.contains(key) {
            return false;
        }
        self.pending.insert(key.to_string());
        true
    }

    /// Give up a reservation without storing anything
    pub(crate) fn release(&mut self, key: &str) {
        self.pending.remove(key);
    }

    /// Store the entry for `key`, ending any reservation
    pub(crate) fn put(&mut self, key: &str, handler: H, handle: T) {
        self.pending.remove(key);
        self.next_generation += 1;
        let entry = Entry {
            handler,
            handle,
            generation: self.next_generation,
        };
        if self.entries.insert(key.to_string(), entry).is_none() {
            self.order.push(key.to_string());
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Entry<H, T>> {
        self.entries.get(key)
    }

    pub(crate) fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn delete(&mut self, key: &str) -> Option<Entry<H, T>> {
        let removed = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(removed)
    }

    /// Swap in a new handle while `key` still holds generation `generation`
    ///
    /// `false` if the entry is gone or was replaced since.
    pub(crate) fn update_handle(&mut self, key: &str, generation: u64, handle: T) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if entry.generation == generation => {
                entry.handle = handle;
                true
            }
            _ => false,
        }
    }

    /// Copy of every (key, entry) pair in insertion order
    pub(crate) fn snapshot(&self) -> Vec<(String, Entry<H, T>)> {
        self.order
            .iter()
            .filter_map(|k| self.entries.get(k).map(|e| (k.clone(), e.clone())))
            .collect()
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.order.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Tracked subscription: event handler plus subscription handle
pub type SubscriptionEntry = Entry<EventHandler, Subscription>;

/// Tracked registration: procedure handler plus registration handle
pub type RegistrationEntry = Entry<ProcedureHandler, Registration>;

/// The two stores the facade keeps
///
/// Cheap to clone; clones share the same stores.
#[derive(Clone)]
pub struct OperationRegistry {
    pub(crate) subscriptions: Arc<Mutex<Store<EventHandler, Subscription>>>,
    pub(crate) registrations: Arc<Mutex<Store<ProcedureHandler, Registration>>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(Mutex::new(Store::new())),
            registrations: Arc::new(Mutex::new(Store::new())),
        }
    }

    /// Subscribed topics in insertion order
    pub async fn topics(&self) -> Vec<String> {
        self.subscriptions.lock().await.keys()
    }

    /// Registered procedure names in insertion order
    pub async fn procedures(&self) -> Vec<String> {
        self.registrations.lock().await.keys()
    }

    pub async fn subscription(&self, topic: &str) -> Option<SubscriptionEntry> {
        self.subscriptions.lock().await.get(topic).cloned()
    }

    pub async fn registration(&self, procedure: &str) -> Option<RegistrationEntry> {
        self.registrations.lock().await.get(procedure).cloned()
    }

    pub async fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.lock().await.has(topic)
    }

    pub async fn is_registered(&self, procedure: &str) -> bool {
        self.registrations.lock().await.has(procedure)
    }

    /// Total tracked operations
    pub async fn len(&self) -> usize {
        self.subscriptions.lock().await.len() + self.registrations.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
