//! # Resilience Layer
//!
//! Fault-tolerance primitives for code that calls remote dependencies.
//!
//! ## Features
//!
//! - Exponential backoff with bounded jitter
//! - Circuit breaker with per-call timeouts and lazy recovery
//! - Resilient executor combining retries with circuit protection
//! - Health scoring and a registry of named breakers
//! - Structured logging via `tracing` and hook-driven metrics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_resilience::{OperationError, ResilienceConfig, ResilientExecutor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ResilienceConfig::from_env()?;
//!     let executor = ResilientExecutor::new("billing", config);
//!
//!     let invoice = executor
//!         .execute_with_resilience(|| async {
//!             Ok::<_, OperationError>("invoice-42".to_string())
//!         })
//!         .await?;
//!
//!     println!("{} -> {}", invoice, executor.health_status().status);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - `config` - Combined configuration, builder and environment loading
//! - `errors` - Error types and failure classification
//! - `resilience` - Backoff, circuit breaker, executor, health, registry
//! - `observability` - Logging setup and metrics

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod config;
pub mod errors;
pub mod observability;
pub mod resilience;

// Development/testing modules
#[cfg(test)]
pub mod mocks;

// Re-exports for convenience
pub use config::{ResilienceConfig, ResilienceConfigBuilder};
pub use errors::{
    CircuitBreakerError, CircuitOpenError, CircuitTimeoutError, Classify, ConfigError,
    ConfigResult, FailureKind, OperationError, ResilienceError, ResilienceResult,
};
pub use observability::{
    init_logging, InMemoryMetricsCollector, LogFormat, LogLevel, LoggingConfig,
    MetricsCollector, MetricsHook, NoopMetricsCollector,
};
pub use resilience::{
    BackoffConfig, BackoffPolicy, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerHook,
    CircuitBreakerRegistry, CircuitState, CircuitStats, FixedJitter, HealthLabel,
    HealthReporter, HealthStatus, JitterSource, ResilientExecutor, ResilientExecutorBuilder,
    ThreadRngJitter,
};

/// The default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// The default number of consecutive failures that opens a circuit
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// The default number of half-open successes that closes a circuit
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 3;

/// The default recovery timeout in seconds
pub const DEFAULT_RECOVERY_TIMEOUT_SECS: u64 = 60;

/// The default per-call timeout in seconds
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;
