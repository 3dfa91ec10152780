//! Circuit breaker implementation.

use crate::errors::{
    CircuitBreakerError, CircuitOpenError, CircuitTimeoutError, Classify, FailureKind,
};
use crate::resilience::error_metrics::ErrorMetrics;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, requests are allowed
    #[default]
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, allowing trial requests
    HalfOpen,
}

impl CircuitState {
    /// Stable lowercase name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the circuit breaker
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time since the last failure before an open circuit admits a trial call
    pub recovery_timeout: Duration,
    /// Consecutive successes in half-open state needed to close the circuit
    pub success_threshold: u32,
    /// Wall-clock limit for a single call
    pub call_timeout: Duration,
    /// Failure kinds that count against the circuit
    pub expected_failures: Vec<FailureKind>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: crate::DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: Duration::from_secs(crate::DEFAULT_RECOVERY_TIMEOUT_SECS),
            success_threshold: crate::DEFAULT_SUCCESS_THRESHOLD,
            call_timeout: Duration::from_secs(crate::DEFAULT_CALL_TIMEOUT_SECS),
            expected_failures: FailureKind::ALL.to_vec(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new circuit breaker configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens quickly and retries the dependency sooner
    pub fn sensitive() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
            ..Self::default()
        }
    }

    /// Tolerates more failures and waits longer before probing
    pub fn lenient() -> Self {
        Self {
            failure_threshold: 10,
            recovery_timeout: Duration::from_secs(120),
            success_threshold: 3,
            ..Self::default()
        }
    }

    /// Set the failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the recovery timeout
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Set the success threshold
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Set the per-call timeout
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Restrict which failure kinds count against the circuit
    pub fn with_expected_failures(mut self, kinds: impl IntoIterator<Item = FailureKind>) -> Self {
        self.expected_failures = kinds.into_iter().collect();
        self
    }

    /// Check whether failures of `kind` are counted
    pub fn is_expected(&self, kind: FailureKind) -> bool {
        self.expected_failures.contains(&kind)
    }
}

/// Hook for circuit breaker events.
///
/// Hooks run while the breaker's lock is held and must not call back into
/// the breaker.
#[cfg_attr(test, mockall::automock)]
pub trait CircuitBreakerHook: Send + Sync {
    /// Called when circuit state changes
    fn on_state_change(&self, circuit: &str, from: CircuitState, to: CircuitState);

    /// Called when a request is rejected due to open circuit
    fn on_rejected(&self, circuit: &str);
}

/// Default circuit breaker hook (does nothing)
#[derive(Debug, Default)]
pub struct DefaultCircuitBreakerHook;

impl CircuitBreakerHook for DefaultCircuitBreakerHook {
    fn on_state_change(&self, _circuit: &str, _from: CircuitState, _to: CircuitState) {}
    fn on_rejected(&self, _circuit: &str) {}
}

/// Read-only snapshot of a breaker's state and metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitStats {
    /// Circuit name
    pub name: String,
    /// Current state
    pub state: CircuitState,
    /// Calls that reached the operation
    pub total_requests: u64,
    /// Successful calls
    pub success_requests: u64,
    /// Failed calls
    pub failed_requests: u64,
    /// Success percentage (0 when no requests)
    pub success_rate: f64,
    /// Failure percentage (0 when no requests)
    pub failure_rate: f64,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Successes since the last failure
    pub consecutive_successes: u32,
    /// Mean of the buffered response times, in seconds
    pub avg_response_time: f64,
    /// Number of buffered response times
    pub response_time_samples: usize,
    /// Failure counts by kind name
    pub error_types: HashMap<String, u64>,
    /// Time of the most recent failure
    pub last_failure_time: Option<DateTime<Utc>>,
    /// Time of the most recent success
    pub last_success_time: Option<DateTime<Utc>>,
    /// Calls rejected while open
    pub total_rejections: u64,
}

impl CircuitStats {
    /// Serialize the snapshot for monitoring consumers
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Internal state for the circuit breaker
#[derive(Debug, Default)]
struct BreakerCore {
    state: CircuitState,
    metrics: ErrorMetrics,
    /// Anchor for the open -> half-open timer
    recovery_anchor: Option<Instant>,
}

/// Circuit breaker guarding one remote dependency.
///
/// State transitions are evaluated lazily at the start of each call; an open
/// circuit with no traffic stays open until the next call arrives.
///
/// Admission (check and transition) and recording (update and transition)
/// each happen atomically under one lock, but the operation itself runs
/// outside it. Callers sharing a breaker can therefore have several
/// operations in flight at once, including while half-open; counters are
/// never lost, yet outcomes are recorded in completion order.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    core: Mutex<BreakerCore>,
    hook: Box<dyn CircuitBreakerHook>,
    total_rejections: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            core: Mutex::new(BreakerCore::default()),
            hook: Box::new(DefaultCircuitBreakerHook),
            total_rejections: AtomicU64::new(0),
        }
    }

    /// Create a circuit breaker with default configuration
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Set a custom hook
    pub fn with_hook(mut self, hook: impl CircuitBreakerHook + 'static) -> Self {
        self.hook = Box::new(hook);
        self
    }

    /// Circuit name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state, without evaluating pending transitions
    pub fn state(&self) -> CircuitState {
        self.core.lock().state
    }

    /// Copy of the current metrics
    pub fn metrics(&self) -> ErrorMetrics {
        self.core.lock().metrics.clone()
    }

    /// Run `operation` through the breaker using the configured call timeout.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        self.call_with_timeout(operation, self.config.call_timeout)
            .await
    }

    /// Run `operation` through the breaker with an explicit timeout.
    ///
    /// An open circuit rejects the call without invoking `operation`. Timeouts
    /// and expected failures are recorded; failures outside the expected set
    /// are returned as [`CircuitBreakerError::Unexpected`] and not recorded.
    pub async fn call_with_timeout<F, Fut, T, E>(
        &self,
        operation: F,
        timeout: Duration,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        self.admit()?;

        let started = Instant::now();
        match tokio::time::timeout(timeout, operation()).await {
            Ok(Ok(value)) => {
                self.on_success(started.elapsed());
                Ok(value)
            }
            Ok(Err(error)) => {
                let kind = error.failure_kind();
                if self.config.is_expected(kind) {
                    self.on_failure(kind);
                    Err(CircuitBreakerError::Failure(error))
                } else {
                    warn!(
                        circuit = %self.name,
                        kind = %kind,
                        "Unexpected failure kind, not counted"
                    );
                    Err(CircuitBreakerError::Unexpected(error))
                }
            }
            Err(_) => {
                self.on_failure(FailureKind::Timeout);
                Err(CircuitTimeoutError {
                    circuit: self.name.clone(),
                    timeout,
                }
                .into())
            }
        }
    }

    /// Snapshot of state and metrics
    pub fn get_stats(&self) -> CircuitStats {
        let core = self.core.lock();
        let metrics = &core.metrics;

        CircuitStats {
            name: self.name.clone(),
            state: core.state,
            total_requests: metrics.total_requests,
            success_requests: metrics.success_requests,
            failed_requests: metrics.failed_requests,
            success_rate: metrics.success_rate(),
            failure_rate: metrics.failure_rate(),
            consecutive_failures: metrics.consecutive_failures,
            consecutive_successes: metrics.consecutive_successes,
            avg_response_time: metrics.avg_response_time(),
            response_time_samples: metrics.response_times.len(),
            error_types: metrics.error_types.clone(),
            last_failure_time: metrics.last_failure_time,
            last_success_time: metrics.last_success_time,
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
        }
    }

    /// Restore the closed state and clear all metrics
    pub fn reset(&self) {
        let mut core = self.core.lock();
        self.transition(&mut core, CircuitState::Closed);
        core.metrics = ErrorMetrics::new();
        core.recovery_anchor = None;
        self.total_rejections.store(0, Ordering::Relaxed);

        info!(circuit = %self.name, "Circuit breaker reset");
    }

    /// Open the circuit now; the recovery timer starts from this moment
    pub fn force_open(&self) {
        let mut core = self.core.lock();
        core.recovery_anchor = Some(Instant::now());
        core.metrics.consecutive_successes = 0;
        self.transition(&mut core, CircuitState::Open);

        warn!(circuit = %self.name, "Circuit breaker forced open");
    }

    /// Close the circuit now and clear the consecutive counters
    pub fn force_close(&self) {
        let mut core = self.core.lock();
        core.metrics.consecutive_failures = 0;
        core.metrics.consecutive_successes = 0;
        core.recovery_anchor = None;
        self.transition(&mut core, CircuitState::Closed);

        info!(circuit = %self.name, "Circuit breaker forced closed");
    }

    /// Evaluate transitions and reject the call if the circuit is open
    fn admit(&self) -> Result<(), CircuitOpenError> {
        let mut core = self.core.lock();
        self.maybe_transition(&mut core);

        if core.state != CircuitState::Open {
            return Ok(());
        }

        self.total_rejections.fetch_add(1, Ordering::Relaxed);
        self.hook.on_rejected(&self.name);
        debug!(circuit = %self.name, "Call rejected, circuit is open");

        // The recovery bound is exclusive, so a rejected call always has time left
        let retry_after = core.recovery_anchor.map(|anchor| {
            self.config
                .recovery_timeout
                .saturating_sub(anchor.elapsed())
                .max(Duration::from_nanos(1))
        });

        Err(CircuitOpenError {
            circuit: self.name.clone(),
            consecutive_failures: core.metrics.consecutive_failures,
            retry_after,
        })
    }

    /// Check if we should transition to a new state
    fn maybe_transition(&self, core: &mut BreakerCore) {
        match core.state {
            CircuitState::Open => {
                let recovered = core
                    .recovery_anchor
                    .map_or(false, |anchor| anchor.elapsed() > self.config.recovery_timeout);

                if recovered {
                    core.metrics.consecutive_successes = 0;
                    self.transition(core, CircuitState::HalfOpen);
                }
            }
            CircuitState::HalfOpen => {
                if core.metrics.consecutive_successes >= self.config.success_threshold {
                    core.metrics.consecutive_failures = 0;
                    self.transition(core, CircuitState::Closed);
                }
            }
            CircuitState::Closed => {}
        }
    }

    fn on_success(&self, elapsed: Duration) {
        let mut core = self.core.lock();
        core.metrics.record_success(elapsed);

        debug!(
            circuit = %self.name,
            elapsed_ms = elapsed.as_millis() as u64,
            "Call succeeded"
        );

        if core.state == CircuitState::HalfOpen
            && core.metrics.consecutive_successes >= self.config.success_threshold
        {
            core.metrics.consecutive_failures = 0;
            self.transition(&mut core, CircuitState::Closed);
        }
    }

    fn on_failure(&self, kind: FailureKind) {
        let mut core = self.core.lock();
        core.metrics.record_failure(kind.name());
        core.recovery_anchor = Some(Instant::now());

        warn!(
            circuit = %self.name,
            kind = %kind,
            consecutive_failures = core.metrics.consecutive_failures,
            "Call failed"
        );

        match core.state {
            CircuitState::Closed => {
                if core.metrics.consecutive_failures >= self.config.failure_threshold {
                    self.transition(&mut core, CircuitState::Open);
                }
            }
            // Any failure while probing reopens the circuit
            CircuitState::HalfOpen => self.transition(&mut core, CircuitState::Open),
            CircuitState::Open => {}
        }
    }

    /// Transition to a new state
    fn transition(&self, core: &mut BreakerCore, to: CircuitState) {
        let from = core.state;
        if from == to {
            return;
        }

        core.state = to;

        match to {
            CircuitState::Open => warn!(
                circuit = %self.name,
                from = %from,
                to = %to,
                consecutive_failures = core.metrics.consecutive_failures,
                "Circuit breaker opened"
            ),
            _ => info!(
                circuit = %self.name,
                from = %from,
                to = %to,
                "Circuit breaker state changed"
            ),
        }

        self.hook.on_state_change(&self.name, from, to);
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
