//! Client builder for configuring options and observability
//!
//! The `ClientBuilder` provides a fluent API for configuring a client before
//! connecting. It allows you to:
//! - Start from custom options instead of the defaults
//! - Configure observability (OpenTelemetry)
//! - Set service name for telemetry
//!
//! # Examples
//!
//! ```rust,no_run
//! use wampease_client::ClientBuilder;
//! use wampease_core::ConnectOptions;
//! use wampease_router::{LoopbackConnector, Router};
//!
//! # async fn example() -> wampease_core::Result<()> {
//! let connector = LoopbackConnector::new(Router::new("chat"));
//!
//! let client = ClientBuilder::new(connector)
//!     .with_connect(ConnectOptions::new("ws://localhost:8080/ws", "chat"))
//!     .with_default_observability()
//!     .service_name("chat-backend")
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::metrics::ClientMetrics;
use crate::WampClient;
use std::sync::Arc;
use wampease_core::{ConnectOptions, Connector, Error, ObservabilityConfig, Options, Result};

/// Builder for configuring and creating a WampClient
pub struct ClientBuilder {
    connector: Arc<dyn Connector>,
    options: Options,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
    enable_metrics: bool,
}

impl ClientBuilder {
    /// Create a new client builder
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Arc::new(connector),
            options: Options::default(),
            observability_config: None,
            service_name: None,
            enable_metrics: false,
        }
    }

    /// Start from `options` instead of the defaults
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Replace only the `connect` sub-configuration
    pub fn with_connect(mut self, connect: ConnectOptions) -> Self {
        self.options.connect = connect;
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Record metrics against the global meter without installing providers
    ///
    /// For applications that set up OpenTelemetry themselves.
    pub fn with_metrics(mut self) -> Self {
        self.enable_metrics = true;
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Build the client without connecting
    pub fn build(self) -> Result<WampClient> {
        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            wampease_core::init_observability(config.clone()).map_err(|e| {
                Error::Internal(format!("Failed to initialize observability: {}", e))
            })?;

            Some(Arc::new(ClientMetrics::new(config.service_name)))
        } else if self.enable_metrics {
            let name = self.service_name.unwrap_or_else(|| "wampease".to_string());
            Some(Arc::new(ClientMetrics::new(name)))
        } else {
            None
        };

        Ok(WampClient::from_parts(self.connector, self.options, metrics))
    }

    /// Build the client and connect with its `connect` options
    pub async fn connect(self) -> Result<WampClient> {
        let client = self.build()?;
        client.connect(None).await?;
        Ok(client)
    }
}
