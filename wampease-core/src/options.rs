//! Facade options
//!
//! Five independent sub-configurations: `connect` (endpoint and realm, plus
//! any transport-specific extras) and four opaque option bags that are passed
//! untouched to the matching session action (`publish`, `subscribe`, `call`,
//! `register`).
//!
//! Updates are shallow: an [`OptionsPatch`] replaces whole sub-configurations
//! and leaves the others alone. [`OptionsStore`] holds the live value for one
//! client and hands out snapshot copies.
//!
//! # Examples
//!
//! ```rust
//! use wampease_core::{Options, OptionsPatch};
//! use serde_json::json;
//!
//! let mut options = Options::default();
//! options.merge(OptionsPatch::from_json(r#"{"publish": {"acknowledge": true}}"#).unwrap());
//!
//! assert!(options.publish_acknowledged());
//! assert_eq!(options.connect.realm, "realm1");
//! ```

use crate::types::Dict;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Endpoint URL used when none is configured
pub const DEFAULT_URL: &str = "ws://localhost:8080/ws";

/// Realm used when none is configured
pub const DEFAULT_REALM: &str = "realm1";

/// Connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    /// Broker endpoint
    pub url: String,
    /// Realm to join
    pub realm: String,
    /// Transport-specific fields passed through untouched
    #[serde(flatten)]
    pub extra: Dict,
}

impl ConnectOptions {
    /// Connect options for `url` and `realm` with no extras
    pub fn new(url: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            realm: realm.into(),
            extra: Dict::new(),
        }
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::new(DEFAULT_URL, DEFAULT_REALM)
    }
}

/// Complete facade configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Connection settings
    pub connect: ConnectOptions,
    /// Options for every publish
    pub publish: Dict,
    /// Options for every subscribe (including recovery replays)
    pub subscribe: Dict,
    /// Options for every call
    pub call: Dict,
    /// Options for every register (including recovery replays)
    pub register: Dict,
}

impl Options {
    /// Parse a full configuration from JSON; missing keys take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Replace every sub-configuration present in `patch`
    pub fn merge(&mut self, patch: OptionsPatch) {
        if let Some(connect) = patch.connect {
            self.connect = connect;
        }
        if let Some(publish) = patch.publish {
            self.publish = publish;
        }
        if let Some(subscribe) = patch.subscribe {
            self.subscribe = subscribe;
        }
        if let Some(call) = patch.call {
            self.call = call;
        }
        if let Some(register) = patch.register {
            self.register = register;
        }
    }

    /// Whether publishes request an acknowledgement from the broker
    pub fn publish_acknowledged(&self) -> bool {
        self.publish
            .get("acknowledge")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Partial update for [`Options`]
///
/// Each `Some` field replaces the whole matching sub-configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsPatch {
    pub connect: Option<ConnectOptions>,
    pub publish: Option<Dict>,
    pub subscribe: Option<Dict>,
    pub call: Option<Dict>,
    pub register: Option<Dict>,
}

impl OptionsPatch {
    /// Empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a patch from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_connect(mut self, connect: ConnectOptions) -> Self {
        self.connect = Some(connect);
        self
    }

    pub fn with_publish(mut self, publish: Dict) -> Self {
        self.publish = Some(publish);
        self
    }

    pub fn with_subscribe(mut self, subscribe: Dict) -> Self {
        self.subscribe = Some(subscribe);
        self
    }

    pub fn with_call(mut self, call: Dict) -> Self {
        self.call = Some(call);
        self
    }

    pub fn with_register(mut self, register: Dict) -> Self {
        self.register = Some(register);
        self
    }
}

/// Live options for one client
///
/// Cheap to clone; clones share the same value.
#[derive(Clone, Default)]
pub struct OptionsStore {
    current: Arc<RwLock<Options>>,
}

impl OptionsStore {
    /// Store seeded with `options`
    pub fn new(options: Options) -> Self {
        Self {
            current: Arc::new(RwLock::new(options)),
        }
    }

    /// Snapshot copy of the current options
    pub async fn get(&self) -> Options {
        self.current.read().await.clone()
    }

    /// Shallow-merge `patch` over the current options
    pub async fn set(&self, patch: OptionsPatch) {
        self.current.write().await.merge(patch);
    }

    /// Restore the built-in defaults
    pub async fn reset(&self) {
        *self.current.write().await = Options::default();
    }
}
