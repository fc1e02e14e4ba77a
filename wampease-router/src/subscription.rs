//! Broker-side subscription table
//!
//! Keeps every subscription the router has granted, indexed two ways:
//! - by subscription id, for unsubscribe and event fan-out
//! - by owning session, for cleanup when a session leaves or is lost
//!
//! Both indexes are updated together so they never disagree.

use std::collections::{HashMap, HashSet};
use wampease_core::{Dict, Error, EventHandler, Result, SessionId};

/// How a subscription's topic is compared against published topics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Topic must be equal
    Exact,
    /// Published topic must start with the subscribed topic
    Prefix,
}

impl MatchPolicy {
    /// Read the `match` subscribe option (`exact` when absent)
    pub fn from_options(options: &Dict) -> Result<Self> {
        match options.get("match").and_then(|v| v.as_str()) {
            None | Some("exact") => Ok(MatchPolicy::Exact),
            Some("prefix") => Ok(MatchPolicy::Prefix),
            Some(other) => Err(Error::protocol(
                "wamp.error.invalid_argument",
                format!("unsupported match policy '{other}'"),
            )),
        }
    }

    fn matches(self, subscribed: &str, published: &str) -> bool {
        match self {
            MatchPolicy::Exact => subscribed == published,
            MatchPolicy::Prefix => published.starts_with(subscribed),
        }
    }
}

/// One granted subscription
#[derive(Clone)]
pub(crate) struct SubscriptionEntry {
    pub(crate) topic: String,
    pub(crate) session: SessionId,
    pub(crate) policy: MatchPolicy,
    pub(crate) handler: EventHandler,
}

/// Subscription ids by id and by owning session
#[derive(Default)]
pub(crate) struct SubscriptionTable {
    by_id: HashMap<u64, SubscriptionEntry>,
    by_session: HashMap<SessionId, HashSet<u64>>,
}

impl SubscriptionTable {
    pub(crate) fn insert(&mut self, id: u64, entry: SubscriptionEntry) {
        self.by_session.entry(entry.session).or_default().insert(id);
        self.by_id.insert(id, entry);
    }

    /// Remove `id` if it belongs to `session`
    pub(crate) fn remove(&mut self, session: SessionId, id: u64) -> bool {
        match self.by_id.get(&id) {
            Some(entry) if entry.session == session => {}
            _ => return false,
        }
        self.by_id.remove(&id);
        if let Some(ids) = self.by_session.get_mut(&session) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_session.remove(&session);
            }
        }
        true
    }

    /// Drop every subscription owned by `session`
    pub(crate) fn remove_session(&mut self, session: SessionId) -> usize {
        let ids = self.by_session.remove(&session).unwrap_or_default();
        for id in &ids {
            self.by_id.remove(id);
        }
        ids.len()
    }

    /// Handlers that should receive an event on `topic`, ordered by id
    pub(crate) fn matching(&self, topic: &str, exclude: Option<SessionId>) -> Vec<EventHandler> {
        let mut hits: Vec<(&u64, &SubscriptionEntry)> = self
            .by_id
            .iter()
            .filter(|(_, e)| Some(e.session) != exclude && e.policy.matches(&e.topic, topic))
            .collect();
        hits.sort_by_key(|(id, _)| **id);
        hits.into_iter().map(|(_, e)| e.handler.clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn topics_for(&self, session: SessionId) -> Vec<String> {
        let mut topics: Vec<String> = self
            .by_session
            .get(&session)
            .into_iter()
            .flatten()
            .filter_map(|id| self.by_id.get(id).map(|e| e.topic.clone()))
            .collect();
        topics.sort();
        topics
    }
}
