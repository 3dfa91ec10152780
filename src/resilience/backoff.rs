//! Exponential backoff with jitter.

use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Lower bound for every computed delay.
pub const MIN_DELAY: Duration = Duration::from_millis(100);

/// Fraction of the delay used as the jitter range (±10%).
pub const JITTER_RATIO: f64 = 0.1;

/// Configuration for backoff behavior
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for the un-jittered delay
    pub max_delay: Duration,
    /// Multiplier applied per attempt
    pub backoff_factor: f64,
    /// Whether to randomize delays by ±10%
    pub jitter_enabled: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: crate::DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            jitter_enabled: true,
        }
    }
}

impl BackoffConfig {
    /// Create a new backoff configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration that never retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// More retries with shorter waits
    pub fn aggressive() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            jitter_enabled: true,
        }
    }

    /// Set the maximum number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter_enabled = enabled;
        self
    }
}

/// Source of randomness for jitter.
pub trait JitterSource: Send + Sync {
    /// A sample in `[-1.0, 1.0]`, scaled by the jitter range.
    fn sample(&self) -> f64;
}

/// Uniform jitter drawn from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn sample(&self) -> f64 {
        rand::thread_rng().gen_range(-1.0..=1.0)
    }
}

/// Always returns the same sample; used for reproducible delays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self) -> f64 {
        self.0.clamp(-1.0, 1.0)
    }
}

/// Computes retry delays from the attempt number.
#[derive(Clone)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    jitter: Arc<dyn JitterSource>,
}

impl BackoffPolicy {
    /// Create a policy using thread-local randomness for jitter
    pub fn new(config: BackoffConfig) -> Self {
        Self::with_jitter_source(config, Arc::new(ThreadRngJitter))
    }

    /// Create a policy with an injected jitter source
    pub fn with_jitter_source(config: BackoffConfig, jitter: Arc<dyn JitterSource>) -> Self {
        Self { config, jitter }
    }

    /// Get the configuration
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Maximum number of retries
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Total attempts allowed (first call plus retries)
    pub fn max_attempts(&self) -> u32 {
        self.config.max_retries.saturating_add(1)
    }

    /// Delay in seconds before the retry following zero-based `attempt`.
    pub fn delay_secs(&self, attempt: u32) -> f64 {
        let base = self.config.base_delay.as_secs_f64();
        let cap = self.config.max_delay.as_secs_f64();

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);

        // 0 * inf is NaN: a zero base never grows
        let grown = base * self.config.backoff_factor.powi(exponent);
        let mut delay = if grown.is_nan() { base } else { grown.min(cap) };

        if self.config.jitter_enabled {
            let jitter = delay * JITTER_RATIO;
            delay += jitter * self.jitter.sample();
        }

        delay.max(MIN_DELAY.as_secs_f64())
    }

    /// Delay before the retry following zero-based `attempt`.
    ///
    /// Saturates at `Duration::MAX` when the jittered cap does not fit.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        Duration::try_from_secs_f64(self.delay_secs(attempt)).unwrap_or(Duration::MAX)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

impl fmt::Debug for BackoffPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackoffPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(config: BackoffConfig) -> BackoffPolicy {
        BackoffPolicy::new(config.with_jitter(false))
    }

    #[test]
    fn test_backoff_config_default() {
        let config = BackoffConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_retries, crate::DEFAULT_MAX_RETRIES);
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(60));
        assert_eq!(config.backoff_factor, 2.0);
        assert!(config.jitter_enabled);
    }

    #[test]
    fn test_backoff_config_builder() {
        let config = BackoffConfig::new()
            .with_max_retries(5)
            .with_base_delay(Duration::from_millis(250))
            .with_max_delay(Duration::from_secs(10))
            .with_backoff_factor(3.0)
            .with_jitter(false);

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.base_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(10));
        assert_eq!(config.backoff_factor, 3.0);
        assert!(!config.jitter_enabled);
    }

    #[test]
    fn test_exponential_growth_without_jitter() {
        let policy = no_jitter(BackoffConfig::default());

        assert_eq!(policy.delay_secs(0), 1.0);
        assert_eq!(policy.delay_secs(1), 2.0);
        assert_eq!(policy.delay_secs(2), 4.0);
        assert_eq!(policy.delay_secs(3), 8.0);
    }

    #[test]
    fn test_delay_is_clamped_at_max() {
        let policy = no_jitter(
            BackoffConfig::new()
                .with_base_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(5))
                .with_backoff_factor(10.0),
        );

        assert_eq!(policy.calculate_delay(1), Duration::from_secs(5));
        assert_eq!(policy.calculate_delay(40), Duration::from_secs(5));
        assert_eq!(policy.calculate_delay(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_floor_applies_to_tiny_delays() {
        let policy = no_jitter(BackoffConfig::new().with_base_delay(Duration::from_millis(1)));
        assert_eq!(policy.calculate_delay(0), MIN_DELAY);

        let zero = no_jitter(BackoffConfig::new().with_base_delay(Duration::ZERO));
        assert_eq!(zero.calculate_delay(3), MIN_DELAY);
    }

    #[test]
    fn test_uncapped_delay_saturates() {
        let uncapped = BackoffConfig::new().with_max_delay(Duration::MAX);

        let plain = no_jitter(uncapped.clone());
        assert_eq!(plain.calculate_delay(10), Duration::from_secs(1024));
        assert!(plain.calculate_delay(80) >= Duration::from_secs(1 << 62));
        assert!(plain.calculate_delay(u32::MAX) >= Duration::from_secs(1 << 62));

        let jittered = BackoffPolicy::with_jitter_source(uncapped, Arc::new(FixedJitter(1.0)));
        assert_eq!(jittered.calculate_delay(80), Duration::MAX);
        assert_eq!(jittered.calculate_delay(u32::MAX), Duration::MAX);
    }

    #[test]
    fn test_zero_base_stays_at_floor_for_large_attempts() {
        let zero = no_jitter(BackoffConfig::new().with_base_delay(Duration::ZERO));
        assert_eq!(zero.calculate_delay(5_000), MIN_DELAY);
        assert_eq!(zero.calculate_delay(u32::MAX), MIN_DELAY);

        let jittered = BackoffPolicy::with_jitter_source(
            BackoffConfig::new().with_base_delay(Duration::ZERO),
            Arc::new(FixedJitter(1.0)),
        );
        assert_eq!(jittered.calculate_delay(5_000), MIN_DELAY);
    }

    #[test]
    fn test_fixed_jitter_bounds() {
        let config = BackoffConfig::default();

        let high = BackoffPolicy::with_jitter_source(config.clone(), Arc::new(FixedJitter(1.0)));
        assert!((high.delay_secs(1) - 2.2).abs() < 1e-9);

        let low = BackoffPolicy::with_jitter_source(config.clone(), Arc::new(FixedJitter(-1.0)));
        assert!((low.delay_secs(1) - 1.8).abs() < 1e-9);

        let clamped = BackoffPolicy::with_jitter_source(config, Arc::new(FixedJitter(7.0)));
        assert!((clamped.delay_secs(1) - 2.2).abs() < 1e-9);
    }

    #[test]
    fn test_random_jitter_stays_within_ten_percent() {
        let policy = BackoffPolicy::default();
        for _ in 0..200 {
            let delay = policy.delay_secs(2);
            assert!((3.6..=4.4).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_max_attempts() {
        let policy = BackoffPolicy::new(BackoffConfig::new().with_max_retries(3));
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.max_attempts(), 4);

        let none = BackoffPolicy::new(BackoffConfig::no_retry());
        assert_eq!(none.max_attempts(), 1);
    }
}
