//! Named circuit breakers shared across a process.

use super::{CircuitBreaker, CircuitBreakerConfig, CircuitStats, HealthReporter, HealthStatus};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Registry of circuit breakers keyed by name.
///
/// Breakers are handed out as `Arc`s so every client of the same dependency
/// observes and drives a single state machine.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    reporter: HealthReporter,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with a custom health reporter
    pub fn with_reporter(reporter: HealthReporter) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            reporter,
        }
    }

    /// Register a breaker under its own name, replacing any previous one.
    ///
    /// Returns the breaker that was replaced, if any.
    pub fn register(&self, breaker: Arc<CircuitBreaker>) -> Option<Arc<CircuitBreaker>> {
        let name = breaker.name().to_string();
        debug!(circuit = %name, "Registering circuit breaker");
        self.breakers.write().insert(name, breaker)
    }

    /// Look up a breaker by name
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().get(name).cloned()
    }

    /// Return the breaker named `name`, creating it with `config` if absent.
    ///
    /// `config` is ignored when the breaker already exists.
    pub fn get_or_register(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.get(name) {
            return existing;
        }

        self.breakers
            .write()
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(circuit = %name, "Creating circuit breaker");
                Arc::new(CircuitBreaker::new(name, config))
            })
            .clone()
    }

    /// Remove a breaker
    pub fn remove(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.write().remove(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered breakers
    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    /// Returns true if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }

    /// Statistics of every breaker, keyed by name
    pub fn all_stats(&self) -> BTreeMap<String, CircuitStats> {
        self.snapshot()
            .into_iter()
            .map(|breaker| (breaker.name().to_string(), breaker.get_stats()))
            .collect()
    }

    /// Health of every breaker, keyed by name
    pub fn health_report(&self) -> BTreeMap<String, HealthStatus> {
        self.snapshot()
            .into_iter()
            .map(|breaker| {
                let health = self.reporter.get_health_status(&breaker.get_stats());
                (breaker.name().to_string(), health)
            })
            .collect()
    }

    /// Reset every breaker to closed with empty metrics
    pub fn reset_all(&self) {
        let breakers = self.snapshot();
        for breaker in &breakers {
            breaker.reset();
        }
        info!(count = breakers.len(), "Reset all circuit breakers");
    }

    // Clone the handles so breaker locks are never taken under the registry lock.
    fn snapshot(&self) -> Vec<Arc<CircuitBreaker>> {
        self.breakers.read().values().cloned().collect()
    }
}
