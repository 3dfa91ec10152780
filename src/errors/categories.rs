//! Failure classification for protected operations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of failure kinds a circuit breaker can recognize.
///
/// Operation errors map themselves onto one of these kinds through
/// [`Classify`]. A breaker only counts failures whose kind is part of its
/// configured expected set; everything else propagates untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The call exceeded its time budget
    Timeout,
    /// Connectivity problems (DNS, connection refused, reset)
    Network,
    /// The dependency throttled the caller
    RateLimit,
    /// The dependency answered with a server-side error
    Server,
    /// The dependency is temporarily unavailable (maintenance, rollout)
    Unavailable,
    /// Credentials were rejected
    Authentication,
    /// The request itself was invalid
    Validation,
    /// Unexpected condition inside the caller
    Internal,
}

impl FailureKind {
    /// Every failure kind, in declaration order.
    pub const ALL: [FailureKind; 8] = [
        FailureKind::Timeout,
        FailureKind::Network,
        FailureKind::RateLimit,
        FailureKind::Server,
        FailureKind::Unavailable,
        FailureKind::Authentication,
        FailureKind::Validation,
        FailureKind::Internal,
    ];

    /// Stable name used as the key in `error_types` statistics.
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "TimeoutError",
            FailureKind::Network => "NetworkError",
            FailureKind::RateLimit => "RateLimitError",
            FailureKind::Server => "ServerError",
            FailureKind::Unavailable => "UnavailableError",
            FailureKind::Authentication => "AuthenticationError",
            FailureKind::Validation => "ValidationError",
            FailureKind::Internal => "InternalError",
        }
    }

    /// Check if failures of this kind are usually transient
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureKind::Timeout
                | FailureKind::Network
                | FailureKind::RateLimit
                | FailureKind::Server
                | FailureKind::Unavailable
        )
    }

    /// Get a human-readable description of this kind
    pub fn description(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "Operation timed out",
            FailureKind::Network => "Network error",
            FailureKind::RateLimit => "Rate limit exceeded",
            FailureKind::Server => "Server error",
            FailureKind::Unavailable => "Service unavailable",
            FailureKind::Authentication => "Authentication error",
            FailureKind::Validation => "Validation error",
            FailureKind::Internal => "Internal error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps an operation error onto a [`FailureKind`].
pub trait Classify {
    /// The kind of failure this error represents.
    fn failure_kind(&self) -> FailureKind;
}

impl<T: Classify + ?Sized> Classify for &T {
    fn failure_kind(&self) -> FailureKind {
        (**self).failure_kind()
    }
}

impl<T: Classify + ?Sized> Classify for Box<T> {
    fn failure_kind(&self) -> FailureKind {
        (**self).failure_kind()
    }
}
