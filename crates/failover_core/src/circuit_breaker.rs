//! Per-plugin circuit breaker state machine
//!
//! Pure transition logic evaluated against a [`HealthMetrics`] record. The
//! breaker owns no timers and spawns no tasks: `Open → HalfOpen` recovery is
//! detected lazily on the read path, once per selection pass, so a broken
//! plugin self-heals purely from the traffic that asks about it. The breaker
//! never raises an error itself; it only flips `circuit_state`, which the
//! selection step consults.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::health::HealthMetrics;

/// Consecutive failures before a closed circuit opens
pub const CIRCUIT_DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// How long an open circuit waits before offering a half-open probe
pub const CIRCUIT_DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(60);

/// Consecutive successes before a half-open circuit closes
pub const CIRCUIT_DEFAULT_SUCCESS_THRESHOLD: u32 = 3;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation, plugin is eligible for selection
    Closed,
    /// Plugin is quarantined, selection skips it
    Open,
    /// Quarantine timed out, plugin may serve a single probe
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Open => f.write_str("open"),
            Self::HalfOpen => f.write_str("half-open"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open a closed circuit
    pub failure_threshold: u32,

    /// Quarantine duration before a half-open probe is offered
    pub open_timeout: Duration,

    /// Consecutive successes that close a half-open circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: CIRCUIT_DEFAULT_FAILURE_THRESHOLD,
            open_timeout: CIRCUIT_DEFAULT_OPEN_TIMEOUT,
            success_threshold: CIRCUIT_DEFAULT_SUCCESS_THRESHOLD,
        }
    }
}

/// One observed state change, reported back for logging and counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitTransition {
    /// State before the transition
    pub from: CircuitState,
    /// State after the transition
    pub to: CircuitState,
}

/// Lazy transition pass, run once per candidate at the start of selection
///
/// Applies at most one transition per call:
/// - `Closed → Open` once the failure streak reaches the threshold
/// - `Open → HalfOpen` once the quarantine timeout has elapsed
/// - `HalfOpen → Closed` once the success streak reaches the threshold
pub fn refresh(
    metrics: &mut HealthMetrics,
    config: &CircuitBreakerConfig,
    now: Instant,
) -> Option<CircuitTransition> {
    match metrics.circuit_state {
        CircuitState::Closed => {
            if metrics.consecutive_failures >= config.failure_threshold {
                Some(open_circuit(metrics, now))
            } else {
                None
            }
        }
        CircuitState::Open => {
            let opened_at = metrics.circuit_opened_at?;
            if now.saturating_duration_since(opened_at) >= config.open_timeout {
                metrics.circuit_state = CircuitState::HalfOpen;
                metrics.circuit_opened_at = None;
                Some(CircuitTransition {
                    from: CircuitState::Open,
                    to: CircuitState::HalfOpen,
                })
            } else {
                None
            }
        }
        CircuitState::HalfOpen => {
            if metrics.consecutive_successes >= config.success_threshold {
                metrics.circuit_state = CircuitState::Closed;
                Some(CircuitTransition {
                    from: CircuitState::HalfOpen,
                    to: CircuitState::Closed,
                })
            } else {
                None
            }
        }
    }
}

/// Transition check after a recorded success
///
/// Streak counters are already updated by the caller; this only closes a
/// half-open circuit whose probe streak reached the threshold.
pub fn on_success(
    metrics: &mut HealthMetrics,
    config: &CircuitBreakerConfig,
) -> Option<CircuitTransition> {
    if metrics.circuit_state == CircuitState::HalfOpen
        && metrics.consecutive_successes >= config.success_threshold
    {
        metrics.circuit_state = CircuitState::Closed;
        return Some(CircuitTransition {
            from: CircuitState::HalfOpen,
            to: CircuitState::Closed,
        });
    }
    None
}

/// Transition check after a recorded failure
///
/// A failure while half-open reopens the circuit immediately with a fresh
/// `circuit_opened_at`: a failed probe means the plugin is still broken,
/// and leaving it half-open would keep offering it live traffic.
pub fn on_failure(
    metrics: &mut HealthMetrics,
    config: &CircuitBreakerConfig,
    now: Instant,
) -> Option<CircuitTransition> {
    match metrics.circuit_state {
        CircuitState::Closed => {
            if metrics.consecutive_failures >= config.failure_threshold {
                Some(open_circuit(metrics, now))
            } else {
                None
            }
        }
        CircuitState::HalfOpen => Some(open_circuit(metrics, now)),
        // Already quarantined; late failure reports do not extend the
        // quarantine window.
        CircuitState::Open => None,
    }
}

fn open_circuit(metrics: &mut HealthMetrics, now: Instant) -> CircuitTransition {
    let from = metrics.circuit_state;
    metrics.circuit_state = CircuitState::Open;
    metrics.circuit_opened_at = Some(now);
    CircuitTransition {
        from,
        to: CircuitState::Open,
    }
}
