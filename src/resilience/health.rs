//! Health scoring derived from circuit breaker statistics.

use super::{CircuitState, CircuitStats};
use serde::Serialize;
use std::fmt;

/// Score above which a breaker is reported healthy.
pub const DEFAULT_HEALTHY_ABOVE: f64 = 80.0;

/// Score above which a breaker is reported degraded.
pub const DEFAULT_DEGRADED_ABOVE: f64 = 50.0;

/// Coarse health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLabel {
    /// Score above the healthy threshold
    Healthy,
    /// Score above the degraded threshold
    Degraded,
    /// Everything else
    Unhealthy,
}

impl HealthLabel {
    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLabel::Healthy => "healthy",
            HealthLabel::Degraded => "degraded",
            HealthLabel::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of one breaker at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    /// Score in `[0, 100]`
    pub health_score: f64,
    /// Label derived from the score
    pub status: HealthLabel,
    /// Statistics the score was computed from
    pub circuit_breaker: CircuitStats,
}

impl HealthStatus {
    /// Returns true if the label is healthy
    pub fn is_healthy(&self) -> bool {
        self.status == HealthLabel::Healthy
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Maps breaker statistics to a health score and label.
///
/// An open breaker scores 0 and a half-open one 50. A closed breaker scores
/// its success rate, or 100 before any call was recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthReporter {
    healthy_above: f64,
    degraded_above: f64,
}

impl Default for HealthReporter {
    fn default() -> Self {
        Self {
            healthy_above: DEFAULT_HEALTHY_ABOVE,
            degraded_above: DEFAULT_DEGRADED_ABOVE,
        }
    }
}

impl HealthReporter {
    /// Create a reporter with the default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reporter with custom thresholds.
    ///
    /// Both bounds are exclusive. A `degraded_above` larger than
    /// `healthy_above` is clamped down to it.
    pub fn with_thresholds(healthy_above: f64, degraded_above: f64) -> Self {
        Self {
            healthy_above,
            degraded_above: degraded_above.min(healthy_above),
        }
    }

    /// Score used for the given statistics
    pub fn health_score(&self, stats: &CircuitStats) -> f64 {
        match stats.state {
            CircuitState::Open => 0.0,
            CircuitState::HalfOpen => 50.0,
            CircuitState::Closed if stats.total_requests == 0 => 100.0,
            CircuitState::Closed => stats.success_rate,
        }
    }

    /// Label for a score
    pub fn label(&self, score: f64) -> HealthLabel {
        if score > self.healthy_above {
            HealthLabel::Healthy
        } else if score > self.degraded_above {
            HealthLabel::Degraded
        } else {
            HealthLabel::Unhealthy
        }
    }

    /// Build the health status for the given statistics
    pub fn get_health_status(&self, stats: &CircuitStats) -> HealthStatus {
        let health_score = self.health_score(stats);
        HealthStatus {
            health_score,
            status: self.label(health_score),
            circuit_breaker: stats.clone(),
        }
    }
}
