//! Error types produced by the circuit breaker and the resilient executor.

use crate::errors::categories::{Classify, FailureKind};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for executor operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

/// Result type alias for configuration handling
pub type ConfigResult<T> = Result<T, ConfigError>;

/// The breaker is rejecting calls without invoking the operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit '{circuit}' is open (consecutive failures: {consecutive_failures})")]
pub struct CircuitOpenError {
    /// Name of the circuit that rejected the call
    pub circuit: String,
    /// Consecutive failures recorded when the call was rejected
    pub consecutive_failures: u32,
    /// Time left until the breaker admits a trial call, if known
    pub retry_after: Option<Duration>,
}

/// The wrapped operation exceeded its time budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit '{circuit}' call timed out after {timeout:?}")]
pub struct CircuitTimeoutError {
    /// Name of the circuit the call went through
    pub circuit: String,
    /// The timeout that expired
    pub timeout: Duration,
}

/// Error returned by a single call through a circuit breaker.
#[derive(Debug, Clone, Error)]
pub enum CircuitBreakerError<E> {
    /// The breaker is open; the operation was not invoked
    #[error(transparent)]
    Open(#[from] CircuitOpenError),

    /// The operation timed out; recorded as a `TimeoutError` failure
    #[error(transparent)]
    Timeout(#[from] CircuitTimeoutError),

    /// The operation failed with an expected error; recorded as a failure
    #[error("operation failed")]
    Failure(#[source] E),

    /// The operation failed with an error outside the expected set; not recorded
    #[error("unexpected operation error")]
    Unexpected(#[source] E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the call was rejected by an open breaker
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open(_))
    }

    /// Returns true if the call timed out
    pub fn is_timeout(&self) -> bool {
        matches!(self, CircuitBreakerError::Timeout(_))
    }

    /// Returns true if the breaker counted this error as a failure
    pub fn is_recorded(&self) -> bool {
        matches!(
            self,
            CircuitBreakerError::Timeout(_) | CircuitBreakerError::Failure(_)
        )
    }

    /// Borrow the operation's own error, if the operation produced one
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            CircuitBreakerError::Failure(e) | CircuitBreakerError::Unexpected(e) => Some(e),
            _ => None,
        }
    }

    /// Take the operation's own error, if the operation produced one
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            CircuitBreakerError::Failure(e) | CircuitBreakerError::Unexpected(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: Classify> CircuitBreakerError<E> {
    /// The failure kind of this error, if it came from the operation or a timeout
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            CircuitBreakerError::Open(_) => None,
            CircuitBreakerError::Timeout(_) => Some(FailureKind::Timeout),
            CircuitBreakerError::Failure(e) | CircuitBreakerError::Unexpected(e) => {
                Some(e.failure_kind())
            }
        }
    }
}

/// Error returned by [`ResilientExecutor`](crate::ResilientExecutor).
#[derive(Debug, Clone, Error)]
pub enum ResilienceError<E> {
    /// The breaker was open; no attempt was made and no retry budget was spent
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// Every allowed attempt failed; the last failure is the source
    #[error("operation failed after {attempts} attempts")]
    RetryExhausted {
        /// Number of attempts made
        attempts: u32,
        /// The failure of the final attempt
        #[source]
        last_error: CircuitBreakerError<E>,
    },

    /// The operation failed with an unclassified error; never retried
    #[error("unexpected operation error")]
    Unexpected(#[source] E),
}

impl<E> ResilienceError<E> {
    /// Returns true if the breaker rejected the call
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen(_))
    }

    /// Returns true if all retries were used up
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, ResilienceError::RetryExhausted { .. })
    }

    /// Number of attempts made before giving up
    pub fn attempts(&self) -> Option<u32> {
        match self {
            ResilienceError::RetryExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// The failure of the final attempt when retries were exhausted
    pub fn last_error(&self) -> Option<&CircuitBreakerError<E>> {
        match self {
            ResilienceError::RetryExhausted { last_error, .. } => Some(last_error),
            _ => None,
        }
    }

    /// Take the operation's own error, if one is carried
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            ResilienceError::CircuitOpen(_) => None,
            ResilienceError::RetryExhausted { last_error, .. } => {
                last_error.into_operation_error()
            }
            ResilienceError::Unexpected(e) => Some(e),
        }
    }
}

/// Configuration error (invalid settings, bad environment values)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A setting violates its constraints
    #[error("Invalid configuration for {field}: {message}")]
    Invalid {
        /// Name of the offending setting
        field: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// An environment variable could not be parsed
    #[error("Invalid value {value:?} for {name}: {message}")]
    Environment {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
        /// Parse failure
        message: String,
    },

    /// The global tracing subscriber could not be installed
    #[error("Logging initialisation failed: {message}")]
    Logging {
        /// Error message from the subscriber
        message: String,
    },
}

/// Classified error for remote operations.
///
/// Operations may use their own error types as long as they implement
/// [`Classify`]; this one covers the common remote-call failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Connectivity failure
    #[error("Network error: {message}")]
    Network {
        /// Error message
        message: String,
    },

    /// The dependency throttled the request
    #[error("Rate limit error: {message}")]
    RateLimit {
        /// Error message
        message: String,
        /// Wait hinted by the dependency
        retry_after: Option<Duration>,
    },

    /// Server-side failure
    #[error("Server error: {message}")]
    Server {
        /// Error message
        message: String,
        /// HTTP status code
        status_code: Option<u16>,
    },

    /// Dependency temporarily unavailable
    #[error("Service unavailable: {message}")]
    Unavailable {
        /// Error message
        message: String,
    },

    /// The operation enforced its own deadline and gave up
    #[error("Timed out: {message}")]
    Timeout {
        /// Error message
        message: String,
    },

    /// Credentials rejected
    #[error("Authentication error: {message}")]
    Authentication {
        /// Error message
        message: String,
    },

    /// Invalid request
    #[error("Validation error: {message}")]
    Validation {
        /// Error message
        message: String,
    },

    /// Unexpected condition in the caller
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl OperationError {
    /// Shorthand for a network error
    pub fn network(message: impl Into<String>) -> Self {
        OperationError::Network {
            message: message.into(),
        }
    }

    /// Shorthand for a server error without status code
    pub fn server(message: impl Into<String>) -> Self {
        OperationError::Server {
            message: message.into(),
            status_code: None,
        }
    }

    /// Shorthand for a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        OperationError::Validation {
            message: message.into(),
        }
    }

    /// Build an error from an HTTP status code and message.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => OperationError::Authentication { message },
            408 | 504 => OperationError::Timeout { message },
            429 => OperationError::RateLimit {
                message,
                retry_after: None,
            },
            503 => OperationError::Unavailable { message },
            500..=599 => OperationError::Server {
                message,
                status_code: Some(status),
            },
            400..=499 => OperationError::Validation { message },
            _ => OperationError::Internal { message },
        }
    }

    /// Returns the retry-after hint if available
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            OperationError::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Get the HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            OperationError::Server { status_code, .. } => *status_code,
            OperationError::RateLimit { .. } => Some(429),
            OperationError::Unavailable { .. } => Some(503),
            OperationError::Authentication { .. } => Some(401),
            _ => None,
        }
    }
}

impl Classify for OperationError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            OperationError::Network { .. } => FailureKind::Network,
            OperationError::RateLimit { .. } => FailureKind::RateLimit,
            OperationError::Server { .. } => FailureKind::Server,
            OperationError::Unavailable { .. } => FailureKind::Unavailable,
            OperationError::Timeout { .. } => FailureKind::Timeout,
            OperationError::Authentication { .. } => FailureKind::Authentication,
            OperationError::Validation { .. } => FailureKind::Validation,
            OperationError::Internal { .. } => FailureKind::Internal,
        }
    }
}

impl From<std::io::Error> for OperationError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::TimedOut => OperationError::Timeout {
                message: err.to_string(),
            },
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::AddrNotAvailable => OperationError::Network {
                message: err.to_string(),
            },
            _ => OperationError::Internal {
                message: format!("IO error: {}", err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_from_status() {
        assert!(matches!(
            OperationError::from_status(503, "down"),
            OperationError::Unavailable { .. }
        ));
        assert!(matches!(
            OperationError::from_status(502, "bad gateway"),
            OperationError::Server {
                status_code: Some(502),
                ..
            }
        ));
        assert!(matches!(
            OperationError::from_status(429, "slow down"),
            OperationError::RateLimit { .. }
        ));
        assert!(matches!(
            OperationError::from_status(401, "nope"),
            OperationError::Authentication { .. }
        ));
        assert!(matches!(
            OperationError::from_status(422, "bad field"),
            OperationError::Validation { .. }
        ));
    }

    #[test]
    fn test_classify_operation_error() {
        assert_eq!(
            OperationError::network("reset").failure_kind(),
            FailureKind::Network
        );
        assert_eq!(
            OperationError::validation("bad").failure_kind(),
            FailureKind::Validation
        );
    }

    #[test]
    fn test_from_io_error() {
        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert_eq!(
            OperationError::from(timed_out).failure_kind(),
            FailureKind::Timeout
        );

        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(
            OperationError::from(refused).failure_kind(),
            FailureKind::Network
        );

        let other = std::io::Error::new(std::io::ErrorKind::InvalidData, "garbage");
        assert_eq!(
            OperationError::from(other).failure_kind(),
            FailureKind::Internal
        );
    }

    #[test]
    fn test_retry_exhausted_source_chain() {
        let err: ResilienceError<OperationError> = ResilienceError::RetryExhausted {
            attempts: 4,
            last_error: CircuitBreakerError::Failure(OperationError::server("boom")),
        };

        assert_eq!(err.attempts(), Some(4));
        assert_eq!(err.to_string(), "operation failed after 4 attempts");

        let source = err.source().expect("retry exhausted carries a source");
        let inner = source.source().expect("failure carries the operation error");
        assert_eq!(inner.to_string(), "Server error: boom");
    }

    #[test]
    fn test_circuit_open_conversion() {
        let open = CircuitOpenError {
            circuit: "sheets".to_string(),
            consecutive_failures: 5,
            retry_after: Some(Duration::from_secs(10)),
        };
        let err: ResilienceError<OperationError> = open.clone().into();

        assert!(err.is_circuit_open());
        assert_eq!(err.to_string(), open.to_string());
        assert!(err.into_operation_error().is_none());
    }

    #[test]
    fn test_breaker_error_helpers() {
        let timeout: CircuitBreakerError<OperationError> = CircuitTimeoutError {
            circuit: "rollback".to_string(),
            timeout: Duration::from_secs(30),
        }
        .into();
        assert!(timeout.is_timeout());
        assert!(timeout.is_recorded());
        assert_eq!(timeout.failure_kind(), Some(FailureKind::Timeout));

        let unexpected = CircuitBreakerError::Unexpected(OperationError::validation("bad"));
        assert!(!unexpected.is_recorded());
        assert_eq!(
            unexpected.into_operation_error(),
            Some(OperationError::validation("bad"))
        );
    }
}
