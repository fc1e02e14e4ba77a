//! Client metrics definitions
//!
//! OpenTelemetry instruments for the facade. They are recorded when the
//! client was built with observability enabled and exported by whatever
//! meter provider `init_observability` installed.
//!
//! # Metrics Collected
//!
//! - **connection.state**: current connection state (gauge)
//! - **operations.total**: facade operations by kind and status (counter)
//! - **operation.duration**: facade operation latency (histogram)
//! - **errors.total**: errors by kind (counter)
//! - **reconnections.total**: sessions reopened by the transport (counter)
//! - **recovery.runs**: recovery passes (counter)
//! - **recovery.items**: operations replayed successfully (counter)
//! - **recovery.failures**: operations that could not be replayed (counter)

use crate::connection_state::ConnectionState;
use crate::recovery::RecoveryReport;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Connection state (0=disconnected, 1=connecting, 2=connected, 3=reconnecting)
    pub connection_state: Gauge<i64>,
    pub operations_total: Counter<u64>,
    /// Operation duration in seconds
    pub operation_duration: Histogram<f64>,
    pub errors_total: Counter<u64>,
    pub reconnections_total: Counter<u64>,
    pub recovery_runs: Counter<u64>,
    pub recovered_items: Counter<u64>,
    pub recovery_failures: Counter<u64>,
}

impl ClientMetrics {
    /// Create a new ClientMetrics instance
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create a new ClientMetrics instance with a custom meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("wampease.client.connection.state")
                .with_description(
                    "Connection state (0=disconnected, 1=connecting, 2=connected, 3=reconnecting)",
                )
                .build(),
            operations_total: meter
                .u64_counter("wampease.client.operations.total")
                .with_description("Total number of facade operations")
                .build(),
            operation_duration: meter
                .f64_histogram("wampease.client.operation.duration")
                .with_description("Facade operation duration in seconds")
                .build(),
            errors_total: meter
                .u64_counter("wampease.client.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
            reconnections_total: meter
                .u64_counter("wampease.client.reconnections.total")
                .with_description("Total number of sessions reopened after a loss")
                .build(),
            recovery_runs: meter
                .u64_counter("wampease.client.recovery.runs")
                .with_description("Total number of recovery passes")
                .build(),
            recovered_items: meter
                .u64_counter("wampease.client.recovery.items")
                .with_description("Subscriptions and registrations replayed successfully")
                .build(),
            recovery_failures: meter
                .u64_counter("wampease.client.recovery.failures")
                .with_description("Subscriptions and registrations that could not be replayed")
                .build(),
        }
    }

    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(state.as_gauge(), &[]);
    }

    /// Record one facade operation
    pub fn record_operation(&self, operation: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("operation", operation.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.operations_total.add(1, attributes);
        self.operation_duration.record(duration_secs, attributes);
    }

    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }

    pub fn record_reconnection(&self) {
        self.reconnections_total.add(1, &[]);
    }

    /// Record the outcome of a recovery pass
    pub fn record_recovery(&self, report: &RecoveryReport) {
        self.recovery_runs.add(1, &[]);
        self.recovered_items.add(
            report.subscriptions as u64,
            &[KeyValue::new("kind", "subscription")],
        );
        self.recovered_items.add(
            report.registrations as u64,
            &[KeyValue::new("kind", "registration")],
        );
        if report.failed > 0 {
            self.recovery_failures.add(report.failed as u64, &[]);
        }
    }
}
