//! Observability module for logging and metrics.

mod logging;
mod metrics;

pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
pub use metrics::{
    state_gauge_value, Counter, Gauge, InMemoryMetricsCollector, MetricsCollector, MetricsHook,
    MetricsSnapshot, NoopMetricsCollector,
};
