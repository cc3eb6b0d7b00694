//! Migration metrics and tracing spans
//!
//! Counters and histograms are recorded through the `opentelemetry` global
//! meter; install a meter provider in the host application to export them.

#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;
#[cfg(feature = "metrics")]
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
    KeyValue,
};

#[cfg(feature = "metrics")]
pub static METRICS: Lazy<DocshiftMetrics> = Lazy::new(DocshiftMetrics::init);

#[cfg(feature = "metrics")]
pub struct DocshiftMetrics {
    pub migrations_applied_total: Counter<u64>,
    pub migrations_undone_total: Counter<u64>,
    pub migration_failures_total: Counter<u64>,
    pub migration_duration: Histogram<f64>,
}

#[cfg(feature = "metrics")]
impl DocshiftMetrics {
    pub fn init() -> Self {
        let meter = global::meter("docshift");

        let migrations_applied_total = meter
            .u64_counter("docshift_migrations_applied_total")
            .with_description("Migrations applied (up)")
            .build();

        let migrations_undone_total = meter
            .u64_counter("docshift_migrations_undone_total")
            .with_description("Migrations undone (down)")
            .build();

        let migration_failures_total = meter
            .u64_counter("docshift_migration_failures_total")
            .with_description("Migration executions that failed or timed out")
            .build();

        let migration_duration = meter
            .f64_histogram("docshift_migration_duration_seconds")
            .with_description("Duration of a single migration up/down")
            .build();

        Self {
            migrations_applied_total,
            migrations_undone_total,
            migration_failures_total,
            migration_duration,
        }
    }

    pub fn record_applied(&self, elapsed: std::time::Duration) {
        self.migrations_applied_total.add(1, &[]);
        self.migration_duration
            .record(elapsed.as_secs_f64(), &[KeyValue::new("direction", "up")]);
    }

    pub fn record_undone(&self, elapsed: std::time::Duration) {
        self.migrations_undone_total.add(1, &[]);
        self.migration_duration
            .record(elapsed.as_secs_f64(), &[KeyValue::new("direction", "down")]);
    }

    pub fn record_failure(&self, direction: &'static str) {
        self.migration_failures_total
            .add(1, &[KeyValue::new("direction", direction)]);
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    pub fn migration_span(class_name: &str, direction: &'static str) -> Span {
        info_span!("docshift.migration", class_name = %class_name, direction = direction)
    }

    pub fn load_span(migrations_dir: &std::path::Path) -> Span {
        info_span!("docshift.load", dir = %migrations_dir.display())
    }
}
