//! Builder for constructing a loopback router
//!
//! # Examples
//!
//! ```rust
//! use wampease_router::{LoopbackConnector, Router};
//! use wampease_core::FixedDelay;
//! use std::time::Duration;
//!
//! let router = Router::builder()
//!     .realm("realm1")
//!     .deny("com.admin.shutdown")
//!     .build();
//!
//! let connector = LoopbackConnector::new(router)
//!     .with_reconnect(FixedDelay::new(Duration::from_millis(50)));
//! # let _ = connector;
//! ```

use crate::router::Router;
use std::collections::HashSet;
use wampease_core::options::DEFAULT_REALM;

/// Builder for a [`Router`]
pub struct RouterBuilder {
    realm: String,
    denied: HashSet<String>,
}

impl RouterBuilder {
    /// Builder for the default realm with nothing denied
    pub fn new() -> Self {
        Self {
            realm: DEFAULT_REALM.to_string(),
            denied: HashSet::new(),
        }
    }

    /// Set the realm the router serves
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// Refuse subscriptions and registrations on `uri`
    pub fn deny(mut self, uri: impl Into<String>) -> Self {
        self.denied.insert(uri.into());
        self
    }

    /// Build the router
    pub fn build(self) -> Router {
        tracing::debug!(realm = %self.realm, denied = self.denied.len(), "Router built");
        Router::with_denied(self.realm, self.denied)
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
