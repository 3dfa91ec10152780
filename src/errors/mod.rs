//! Error types for the resilience core.
//!
//! Failures are classified into a closed [`FailureKind`] set; breaker and
//! executor errors wrap the caller's own error type.

mod categories;
mod error;

pub use categories::{Classify, FailureKind};
pub use error::{
    CircuitBreakerError, CircuitOpenError, CircuitTimeoutError, ConfigError, ConfigResult,
    OperationError, ResilienceError, ResilienceResult,
};
