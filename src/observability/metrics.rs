//! Metrics for circuit breaker events.

use crate::resilience::{CircuitBreakerHook, CircuitState};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A counter metric
#[derive(Debug)]
pub struct Counter {
    name: String,
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: AtomicU64::new(0),
        }
    }

    /// Increment the counter
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Add a value to the counter
    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    /// Get the current value
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Get the name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A gauge metric
#[derive(Debug)]
pub struct Gauge {
    name: String,
    value: AtomicU64,
}

impl Gauge {
    /// Create a new gauge
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: AtomicU64::new(0),
        }
    }

    /// Set the gauge value
    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Get the current value
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Get the name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Numeric encoding of a circuit state for gauges: 0 closed, 1 half-open, 2 open.
pub fn state_gauge_value(state: CircuitState) -> u64 {
    match state {
        CircuitState::Closed => 0,
        CircuitState::HalfOpen => 1,
        CircuitState::Open => 2,
    }
}

/// Trait for metrics collection
pub trait MetricsCollector: Send + Sync {
    /// Record a state transition of a circuit
    fn record_transition(&self, circuit: &str, from: CircuitState, to: CircuitState);

    /// Record a call rejected by an open circuit
    fn record_rejection(&self, circuit: &str);

    /// Get a snapshot of all metrics
    fn snapshot(&self) -> MetricsSnapshot;
}

/// A snapshot of metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Transitions keyed by `circuit.from.to`
    pub transitions: BTreeMap<String, u64>,
    /// Rejections keyed by circuit
    pub rejections: BTreeMap<String, u64>,
    /// Last known state gauge keyed by circuit
    pub states: BTreeMap<String, u64>,
}

/// In-memory metrics collector
#[derive(Debug, Default)]
pub struct InMemoryMetricsCollector {
    transitions: RwLock<HashMap<String, Arc<Counter>>>,
    rejections: RwLock<HashMap<String, Arc<Counter>>>,
    states: RwLock<HashMap<String, Arc<Gauge>>>,
}

impl InMemoryMetricsCollector {
    /// Create a new in-memory metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create<M>(
        map: &RwLock<HashMap<String, Arc<M>>>,
        key: &str,
        create: impl FnOnce(&str) -> M,
    ) -> Arc<M> {
        {
            let read = map.read();
            if let Some(metric) = read.get(key) {
                return metric.clone();
            }
        }

        let mut write = map.write();
        write
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(create(key)))
            .clone()
    }
}

impl MetricsCollector for InMemoryMetricsCollector {
    fn record_transition(&self, circuit: &str, from: CircuitState, to: CircuitState) {
        let key = format!("{}.{}.{}", circuit, from, to);
        Self::get_or_create(&self.transitions, &key, |k| Counter::new(k)).inc();
        Self::get_or_create(&self.states, circuit, |k| Gauge::new(k)).set(state_gauge_value(to));
    }

    fn record_rejection(&self, circuit: &str) {
        Self::get_or_create(&self.rejections, circuit, |k| Counter::new(k)).inc();
    }

    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transitions: self
                .transitions
                .read()
                .iter()
                .map(|(k, c)| (k.clone(), c.get()))
                .collect(),
            rejections: self
                .rejections
                .read()
                .iter()
                .map(|(k, c)| (k.clone(), c.get()))
                .collect(),
            states: self
                .states
                .read()
                .iter()
                .map(|(k, g)| (k.clone(), g.get()))
                .collect(),
        }
    }
}

/// No-op metrics collector for when metrics are disabled
#[derive(Debug, Default)]
pub struct NoopMetricsCollector;

impl MetricsCollector for NoopMetricsCollector {
    fn record_transition(&self, _circuit: &str, _from: CircuitState, _to: CircuitState) {}
    fn record_rejection(&self, _circuit: &str) {}
    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::default()
    }
}

/// Circuit breaker hook that forwards events to a [`MetricsCollector`].
#[derive(Clone)]
pub struct MetricsHook {
    collector: Arc<dyn MetricsCollector>,
}

impl MetricsHook {
    /// Create a hook feeding `collector`
    pub fn new(collector: Arc<dyn MetricsCollector>) -> Self {
        Self { collector }
    }
}

impl CircuitBreakerHook for MetricsHook {
    fn on_state_change(&self, circuit: &str, from: CircuitState, to: CircuitState) {
        self.collector.record_transition(circuit, from, to);
    }

    fn on_rejected(&self, circuit: &str) {
        self.collector.record_rejection(circuit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::OperationError;
    use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};

    #[test]
    fn test_counter() {
        let counter = Counter::new("test_counter");
        assert_eq!(counter.get(), 0);

        counter.inc();
        assert_eq!(counter.get(), 1);

        counter.add(5);
        assert_eq!(counter.get(), 6);
        assert_eq!(counter.name(), "test_counter");
    }

    #[test]
    fn test_gauge() {
        let gauge = Gauge::new("test_gauge");
        gauge.set(2);
        assert_eq!(gauge.get(), 2);
        gauge.set(0);
        assert_eq!(gauge.get(), 0);
    }

    #[test]
    fn test_in_memory_collector() {
        let collector = InMemoryMetricsCollector::new();

        collector.record_transition("db", CircuitState::Closed, CircuitState::Open);
        collector.record_rejection("db");
        collector.record_rejection("db");

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.transitions.get("db.closed.open"), Some(&1));
        assert_eq!(snapshot.rejections.get("db"), Some(&2));
        assert_eq!(snapshot.states.get("db"), Some(&2));
    }

    #[tokio::test]
    async fn test_metrics_hook_tracks_breaker() {
        let collector = Arc::new(InMemoryMetricsCollector::new());
        let breaker = CircuitBreaker::new(
            "search",
            CircuitBreakerConfig::default().with_failure_threshold(1),
        )
        .with_hook(MetricsHook::new(collector.clone()));

        let _ = breaker
            .call(|| async { Err::<(), _>(OperationError::network("down")) })
            .await;
        let _ = breaker.call(|| async { Ok::<_, OperationError>(()) }).await;

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.transitions.get("search.closed.open"), Some(&1));
        assert_eq!(snapshot.rejections.get("search"), Some(&1));
        assert_eq!(snapshot.states.get("search"), Some(&state_gauge_value(CircuitState::Open)));
    }

    #[test]
    fn test_noop_collector() {
        let collector = NoopMetricsCollector;
        collector.record_rejection("x");
        assert_eq!(collector.snapshot(), MetricsSnapshot::default());
    }
}
