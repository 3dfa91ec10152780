//! Configuration for the resilience layer.

use crate::errors::{ConfigError, ConfigResult};
use crate::resilience::{BackoffConfig, CircuitBreakerConfig};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable for the breaker failure threshold
pub const ENV_FAILURE_THRESHOLD: &str = "RESILIENCE_FAILURE_THRESHOLD";
/// Environment variable for the recovery timeout in seconds
pub const ENV_RECOVERY_TIMEOUT_SECS: &str = "RESILIENCE_RECOVERY_TIMEOUT_SECS";
/// Environment variable for the half-open success threshold
pub const ENV_SUCCESS_THRESHOLD: &str = "RESILIENCE_SUCCESS_THRESHOLD";
/// Environment variable for the per-call timeout in seconds
pub const ENV_CALL_TIMEOUT_SECS: &str = "RESILIENCE_CALL_TIMEOUT_SECS";
/// Environment variable for the retry budget
pub const ENV_MAX_RETRIES: &str = "RESILIENCE_MAX_RETRIES";
/// Environment variable for the base backoff delay in milliseconds
pub const ENV_BASE_DELAY_MS: &str = "RESILIENCE_BASE_DELAY_MS";
/// Environment variable for the backoff cap in milliseconds
pub const ENV_MAX_DELAY_MS: &str = "RESILIENCE_MAX_DELAY_MS";
/// Environment variable for the backoff multiplier
pub const ENV_BACKOFF_FACTOR: &str = "RESILIENCE_BACKOFF_FACTOR";
/// Environment variable toggling jitter
pub const ENV_JITTER: &str = "RESILIENCE_JITTER";

/// Combined circuit breaker and backoff configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResilienceConfig {
    /// Circuit breaker settings
    pub circuit_breaker: CircuitBreakerConfig,
    /// Retry and backoff settings
    pub backoff: BackoffConfig,
}

impl ResilienceConfig {
    /// Create a new config builder.
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults:
    /// - `RESILIENCE_FAILURE_THRESHOLD`: failures before the circuit opens
    /// - `RESILIENCE_RECOVERY_TIMEOUT_SECS`: open time before probing
    /// - `RESILIENCE_SUCCESS_THRESHOLD`: half-open successes needed to close
    /// - `RESILIENCE_CALL_TIMEOUT_SECS`: per-call timeout
    /// - `RESILIENCE_MAX_RETRIES`: retries after the first attempt
    /// - `RESILIENCE_BASE_DELAY_MS` / `RESILIENCE_MAX_DELAY_MS`: backoff bounds
    /// - `RESILIENCE_BACKOFF_FACTOR`: backoff multiplier
    /// - `RESILIENCE_JITTER`: `true`/`false`
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<L>(lookup: L) -> ConfigResult<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut builder = ResilienceConfigBuilder::new();

        if let Some(v) = parse_var::<u32, _>(&lookup, ENV_FAILURE_THRESHOLD)? {
            builder = builder.failure_threshold(v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, ENV_RECOVERY_TIMEOUT_SECS)? {
            builder = builder.recovery_timeout(Duration::from_secs(v));
        }
        if let Some(v) = parse_var::<u32, _>(&lookup, ENV_SUCCESS_THRESHOLD)? {
            builder = builder.success_threshold(v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, ENV_CALL_TIMEOUT_SECS)? {
            builder = builder.call_timeout(Duration::from_secs(v));
        }
        if let Some(v) = parse_var::<u32, _>(&lookup, ENV_MAX_RETRIES)? {
            builder = builder.max_retries(v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, ENV_BASE_DELAY_MS)? {
            builder = builder.base_delay(Duration::from_millis(v));
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, ENV_MAX_DELAY_MS)? {
            builder = builder.max_delay(Duration::from_millis(v));
        }
        if let Some(v) = parse_var::<f64, _>(&lookup, ENV_BACKOFF_FACTOR)? {
            builder = builder.backoff_factor(v);
        }
        if let Some(raw) = lookup(ENV_JITTER) {
            builder = builder.jitter(parse_flag(ENV_JITTER, &raw)?);
        }

        builder.build()
    }

    /// Check every setting against its constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        let cb = &self.circuit_breaker;
        let backoff = &self.backoff;

        if cb.failure_threshold == 0 {
            return Err(invalid("failure_threshold", "must be at least 1"));
        }
        if cb.success_threshold == 0 {
            return Err(invalid("success_threshold", "must be at least 1"));
        }
        if cb.recovery_timeout.is_zero() {
            return Err(invalid("recovery_timeout", "must be greater than zero"));
        }
        if cb.call_timeout.is_zero() {
            return Err(invalid("call_timeout", "must be greater than zero"));
        }
        if cb.expected_failures.is_empty() {
            return Err(invalid("expected_failures", "must name at least one failure kind"));
        }
        if backoff.base_delay > backoff.max_delay {
            return Err(invalid("base_delay", "must not exceed max_delay"));
        }
        if !backoff.backoff_factor.is_finite() || backoff.backoff_factor < 1.0 {
            return Err(invalid("backoff_factor", "must be a finite number >= 1.0"));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.to_string(),
    }
}

fn parse_var<T, L>(lookup: &L, name: &'static str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    L: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };

    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::Environment {
            name,
            value: raw.clone(),
            message: e.to_string(),
        })
}

fn parse_flag(name: &'static str, raw: &str) -> ConfigResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Environment {
            name,
            value: raw.to_string(),
            message: "expected a boolean".to_string(),
        }),
    }
}

/// Builder for [`ResilienceConfig`].
#[derive(Debug, Default)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    /// Create a builder starting from defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the circuit breaker settings
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.config.circuit_breaker = config;
        self
    }

    /// Replace the backoff settings
    pub fn backoff(mut self, config: BackoffConfig) -> Self {
        self.config.backoff = config;
        self
    }

    /// Set the failure threshold
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.circuit_breaker.failure_threshold = threshold;
        self
    }

    /// Set the recovery timeout
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.circuit_breaker.recovery_timeout = timeout;
        self
    }

    /// Set the half-open success threshold
    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.circuit_breaker.success_threshold = threshold;
        self
    }

    /// Set the per-call timeout
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.circuit_breaker.call_timeout = timeout;
        self
    }

    /// Set the maximum retries
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.backoff.max_retries = max_retries;
        self
    }

    /// Set the base delay
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.backoff.base_delay = delay;
        self
    }

    /// Set the maximum delay
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.backoff.max_delay = delay;
        self
    }

    /// Set the backoff multiplier
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.config.backoff.backoff_factor = factor;
        self
    }

    /// Enable or disable jitter
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.config.backoff.jitter_enabled = enabled;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> ConfigResult<ResilienceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
