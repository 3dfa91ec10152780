//! Retry with backoff, gated by a circuit breaker.

use super::{
    BackoffConfig, BackoffPolicy, CircuitBreaker, CircuitBreakerConfig, HealthReporter,
    HealthStatus, JitterSource,
};
use crate::config::ResilienceConfig;
use crate::errors::{CircuitBreakerError, Classify, ResilienceError};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Default circuit name used when none is given.
pub const DEFAULT_CIRCUIT_NAME: &str = "default";

/// Runs operations through a circuit breaker and retries failures with
/// exponential backoff.
///
/// An open circuit ends the call immediately with
/// [`ResilienceError::CircuitOpen`]; retrying against it would only burn the
/// retry budget until the recovery timeout passes.
///
/// # Example
///
/// ```rust,no_run
/// use integrations_resilience::{OperationError, ResilientExecutor};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let executor = ResilientExecutor::builder().name("sheets").build();
///
/// let _rows = executor
///     .execute_with_resilience(|| async { Ok::<_, OperationError>(vec!["row"]) })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ResilientExecutor {
    circuit_breaker: Arc<CircuitBreaker>,
    backoff: BackoffPolicy,
    reporter: HealthReporter,
}

impl ResilientExecutor {
    /// Create an executor with its own breaker from a configuration
    pub fn new(name: impl Into<String>, config: ResilienceConfig) -> Self {
        Self::with_parts(
            Arc::new(CircuitBreaker::new(name, config.circuit_breaker)),
            BackoffPolicy::new(config.backoff),
        )
    }

    /// Create an executor around an existing, possibly shared, breaker
    pub fn with_parts(circuit_breaker: Arc<CircuitBreaker>, backoff: BackoffPolicy) -> Self {
        Self {
            circuit_breaker,
            backoff,
            reporter: HealthReporter::default(),
        }
    }

    /// Create a builder
    pub fn builder() -> ResilientExecutorBuilder {
        ResilientExecutorBuilder::new()
    }

    /// Get the circuit breaker
    pub fn circuit_breaker(&self) -> Arc<CircuitBreaker> {
        self.circuit_breaker.clone()
    }

    /// Get the backoff policy
    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Health derived from the breaker's current statistics
    pub fn health_status(&self) -> HealthStatus {
        self.reporter
            .get_health_status(&self.circuit_breaker.get_stats())
    }

    /// Run `operation` with circuit breaker protection and retries.
    ///
    /// Up to `max_retries + 1` attempts are made. Timeouts and expected
    /// failures are retried after the backoff delay; an open circuit or an
    /// unexpected failure ends the call at once.
    pub async fn execute_with_resilience<F, Fut, T, E>(
        &self,
        mut operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let circuit = self.circuit_breaker.name();
        let max_retries = self.backoff.max_retries();
        let mut attempt: u32 = 0;

        loop {
            let error = match self.circuit_breaker.call(|| operation()).await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(circuit, retries = attempt, "Operation succeeded after {} retries", attempt);
                    }
                    return Ok(value);
                }
                Err(CircuitBreakerError::Open(open)) => {
                    error!(circuit, "Circuit breaker is open, operation blocked");
                    return Err(ResilienceError::CircuitOpen(open));
                }
                Err(CircuitBreakerError::Unexpected(e)) => {
                    error!(circuit, error = %e, "Unexpected error in resilient execution");
                    return Err(ResilienceError::Unexpected(e));
                }
                Err(e) => e,
            };

            if attempt >= max_retries {
                error!(
                    circuit,
                    attempts = attempt + 1,
                    error = %DisplayCause(&error),
                    "All retry attempts exhausted"
                );
                return Err(ResilienceError::RetryExhausted {
                    attempts: attempt + 1,
                    last_error: error,
                });
            }

            let delay = self.backoff.calculate_delay(attempt);
            warn!(
                circuit,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %DisplayCause(&error),
                "Attempt failed, retrying"
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl fmt::Debug for ResilientExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientExecutor")
            .field("circuit_breaker", &self.circuit_breaker)
            .field("backoff", &self.backoff)
            .finish()
    }
}

/// Formats a breaker error including the operation's own message.
struct DisplayCause<'a, E>(&'a CircuitBreakerError<E>);

impl<E: fmt::Display> fmt::Display for DisplayCause<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            CircuitBreakerError::Open(e) => write!(f, "{}", e),
            CircuitBreakerError::Timeout(e) => write!(f, "{}", e),
            CircuitBreakerError::Failure(e) | CircuitBreakerError::Unexpected(e) => {
                write!(f, "{}", e)
            }
        }
    }
}

/// Builder for [`ResilientExecutor`]
pub struct ResilientExecutorBuilder {
    name: String,
    config: ResilienceConfig,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    jitter: Option<Arc<dyn JitterSource>>,
    reporter: HealthReporter,
}

impl ResilientExecutorBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            name: DEFAULT_CIRCUIT_NAME.to_string(),
            config: ResilienceConfig::default(),
            circuit_breaker: None,
            jitter: None,
            reporter: HealthReporter::default(),
        }
    }

    /// Set the circuit name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the full configuration
    pub fn with_config(mut self, config: ResilienceConfig) -> Self {
        self.config = config;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, config: BackoffConfig) -> Self {
        self.config.backoff = config;
        self
    }

    /// Set circuit breaker configuration
    pub fn circuit_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.config.circuit_breaker = config;
        self
    }

    /// Use an existing breaker; its own configuration wins over the builder's
    pub fn shared_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    /// Inject the jitter source used by the backoff policy
    pub fn jitter_source(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Set the health reporter
    pub fn health_reporter(mut self, reporter: HealthReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Build the executor
    pub fn build(self) -> ResilientExecutor {
        let circuit_breaker = self.circuit_breaker.unwrap_or_else(|| {
            Arc::new(CircuitBreaker::new(self.name, self.config.circuit_breaker))
        });

        let backoff = match self.jitter {
            Some(jitter) => BackoffPolicy::with_jitter_source(self.config.backoff, jitter),
            None => BackoffPolicy::new(self.config.backoff),
        };

        ResilientExecutor {
            circuit_breaker,
            backoff,
            reporter: self.reporter,
        }
    }
}

impl Default for ResilientExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{FailureKind, OperationError};
    use crate::mocks::MockOperation;
    use crate::resilience::{CircuitState, FixedJitter};
    use std::time::Duration;

    fn executor(max_retries: u32, failure_threshold: u32) -> ResilientExecutor {
        ResilientExecutor::builder()
            .name("test")
            .backoff(
                BackoffConfig::new()
                    .with_max_retries(max_retries)
                    .with_base_delay(Duration::from_millis(10)),
            )
            .circuit_breaker_config(
                CircuitBreakerConfig::new().with_failure_threshold(failure_threshold),
            )
            .jitter_source(Arc::new(FixedJitter(0.0)))
            .build()
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_success_first_try() {
        let executor = executor(3, 5);
        let op = MockOperation::succeeding("ok");

        let result = executor
            .execute_with_resilience(|| op.invoke())
            .await
            .unwrap();

        assert_eq!(result, "ok");
        assert_eq!(op.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_recovers_after_failures() {
        let executor = executor(5, 5);
        let op = MockOperation::failing_then(2, OperationError::network("reset"), 42);

        let result = executor
            .execute_with_resilience(|| op.invoke())
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(op.calls(), 3);

        let stats = executor.circuit_breaker().get_stats();
        assert_eq!(stats.failed_requests, 2);
        assert_eq!(stats.success_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcomes_scripted_between_runs() {
        let executor = executor(2, 10);
        let op = MockOperation::succeeding(5u32);

        assert_eq!(executor.execute_with_resilience(|| op.invoke()).await.unwrap(), 5);

        op.push(Err(OperationError::network("reset")));
        op.push(Err(OperationError::from_status(503, "draining")));
        assert_eq!(executor.execute_with_resilience(|| op.invoke()).await.unwrap(), 5);
        assert_eq!(op.calls(), 4);

        let stats = executor.circuit_breaker().get_stats();
        assert_eq!(stats.error_types.get("NetworkError"), Some(&1));
        assert_eq!(stats.error_types.get("UnavailableError"), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_exhausts_retries() {
        let executor = executor(3, 10);
        let op = MockOperation::<u32>::always_failing(OperationError::server("down"));

        let err = executor
            .execute_with_resilience(|| op.invoke())
            .await
            .unwrap_err();

        assert!(err.is_retry_exhausted());
        assert_eq!(err.attempts(), Some(4));
        assert_eq!(op.calls(), 4);
        assert_eq!(
            err.into_operation_error(),
            Some(OperationError::server("down"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_stops_retrying() {
        let executor = executor(5, 2);
        let op = MockOperation::<u32>::always_failing(OperationError::server("down"));

        let err = executor
            .execute_with_resilience(|| op.invoke())
            .await
            .unwrap_err();

        assert!(err.is_circuit_open());
        assert_eq!(op.calls(), 2);
        assert_eq!(executor.circuit_breaker().state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_error_is_not_retried() {
        let executor = ResilientExecutor::builder()
            .circuit_breaker_config(
                CircuitBreakerConfig::new().with_expected_failures([FailureKind::Server]),
            )
            .build();
        let op = MockOperation::<u32>::always_failing(OperationError::validation("bad"));

        let err = executor
            .execute_with_resilience(|| op.invoke())
            .await
            .unwrap_err();

        assert!(matches!(err, ResilienceError::Unexpected(_)));
        assert_eq!(op.calls(), 1);
        assert_eq!(executor.circuit_breaker().get_stats().total_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_between_attempts() {
        let executor = ResilientExecutor::builder()
            .backoff(
                BackoffConfig::new()
                    .with_max_retries(2)
                    .with_base_delay(Duration::from_secs(1))
                    .with_jitter(false),
            )
            .build();
        let op = MockOperation::<u32>::always_failing(OperationError::network("reset"));

        let started = tokio::time::Instant::now();
        let _ = executor.execute_with_resilience(|| op.invoke()).await;

        // 1s after the first failure, 2s after the second
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_breaker_is_used() {
        let shared = Arc::new(CircuitBreaker::new(
            "payments",
            CircuitBreakerConfig::new().with_failure_threshold(1),
        ));
        shared.force_open();

        let executor = ResilientExecutor::builder()
            .shared_circuit_breaker(shared.clone())
            .build();
        let op = MockOperation::succeeding(1u32);

        let err = executor
            .execute_with_resilience(|| op.invoke())
            .await
            .unwrap_err();

        assert!(err.is_circuit_open());
        assert_eq!(op.calls(), 0);
        assert_eq!(executor.circuit_breaker().name(), "payments");
    }

    #[tokio::test]
    async fn test_health_status_starts_healthy() {
        let executor = executor(1, 1);
        let health = executor.health_status();
        assert_eq!(health.health_score, 100.0);
        assert_eq!(health.status.as_str(), "healthy");
    }
}
