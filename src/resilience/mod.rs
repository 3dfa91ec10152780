//! Fault-tolerance primitives for calls to remote dependencies.
//!
//! This module provides:
//! - Exponential backoff with jitter
//! - Circuit breaker with lazy recovery
//! - Resilient executor combining both
//! - Health scoring and a registry of named breakers

mod backoff;
mod circuit_breaker;
mod error_metrics;
mod executor;
mod health;
mod registry;

pub use backoff::{
    BackoffConfig, BackoffPolicy, FixedJitter, JitterSource, ThreadRngJitter, JITTER_RATIO,
    MIN_DELAY,
};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerHook, CircuitState, CircuitStats,
    DefaultCircuitBreakerHook,
};
pub use error_metrics::{ErrorMetrics, RESPONSE_TIME_WINDOW};
pub use executor::{ResilientExecutor, ResilientExecutorBuilder, DEFAULT_CIRCUIT_NAME};
pub use health::{
    HealthLabel, HealthReporter, HealthStatus, DEFAULT_DEGRADED_ABOVE, DEFAULT_HEALTHY_ABOVE,
};
pub use registry::CircuitBreakerRegistry;
