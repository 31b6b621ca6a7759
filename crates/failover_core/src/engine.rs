//! Failover engine orchestrator
//!
//! The public façade over the health store, circuit breakers, scoring, and
//! selection strategies. One engine instance owns its store for the life of
//! the process and is shared by reference across concurrent callers; there
//! is no global registry. Selection is a pure read-and-reserve pass: no
//! blocking I/O, no sleeps, no background tasks, O(n) over the candidate
//! list.
//!
//! The loop a caller closes: select a plugin, perform the real call out of
//! band, then report the outcome so health, load, and breaker state stay
//! accurate. A caller that abandons a request should still report a failure
//! (e.g. on timeout), otherwise the reservation stays in the load signal.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::backoff::{self, RetryConfig};
use crate::circuit_breaker::{self, CircuitBreakerConfig, CircuitState, CircuitTransition};
use crate::error::{FailoverError, Result};
use crate::health::{HealthMetrics, HealthStore};
use crate::scoring::ScoringConfig;
use crate::strategies;
use crate::types::{
    EngineStatsSnapshot, FailoverContext, FailoverEvent, FailoverResult, PluginStats,
    SelectionStrategy,
};

/// Default EMA smoothing factor for response-time averaging
pub const ENGINE_DEFAULT_LEARNING_RATE: f64 = 0.1;

/// Confidence reported when selection falls back to a half-open probe
pub const ENGINE_PROBE_CONFIDENCE: f64 = 0.25;

/// Bounded failover incident history size
pub const ENGINE_MAX_EVENTS_HISTORY: usize = 1000;

/// Constructor-time engine configuration with documented defaults
#[derive(Debug, Clone)]
pub struct FailoverEngineConfig {
    /// Circuit breaker thresholds and quarantine timeout
    pub circuit: CircuitBreakerConfig,

    /// Weights and bounds for the weighted scoring strategy
    pub scoring: ScoringConfig,

    /// Retry-delay pacing parameters
    pub retry: RetryConfig,

    /// EMA smoothing factor for response-time averaging
    pub learning_rate: f64,

    /// Strategy used when the caller does not request one
    pub default_strategy: SelectionStrategy,
}

impl Default for FailoverEngineConfig {
    fn default() -> Self {
        Self {
            circuit: CircuitBreakerConfig::default(),
            scoring: ScoringConfig::default(),
            retry: RetryConfig::default(),
            learning_rate: ENGINE_DEFAULT_LEARNING_RATE,
            default_strategy: SelectionStrategy::Intelligent,
        }
    }
}

/// Engine-level counters, updated with relaxed atomics on every call
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Successful selection calls
    pub selections: AtomicU64,

    /// Selection calls that returned an error
    pub failed_selections: AtomicU64,

    /// Selections served by a half-open probe
    pub probe_selections: AtomicU64,

    /// Circuit transitions into `Open`
    pub circuit_opens: AtomicU64,

    /// Circuit transitions into `Closed`
    pub circuit_closes: AtomicU64,

    /// Performance reports recorded
    pub outcomes_recorded: AtomicU64,
}

impl EngineStats {
    /// Consistent-enough snapshot for export
    #[must_use]
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            selections: self.selections.load(Ordering::Relaxed),
            failed_selections: self.failed_selections.load(Ordering::Relaxed),
            probe_selections: self.probe_selections.load(Ordering::Relaxed),
            circuit_opens: self.circuit_opens.load(Ordering::Relaxed),
            circuit_closes: self.circuit_closes.load(Ordering::Relaxed),
            outcomes_recorded: self.outcomes_recorded.load(Ordering::Relaxed),
        }
    }
}

/// Intelligent failover engine
///
/// Construct once per process and share by reference; all methods take
/// `&self` and are safe to call from concurrent request paths.
pub struct FailoverEngine {
    config: FailoverEngineConfig,
    store: HealthStore,
    stats: EngineStats,
    events: Mutex<VecDeque<FailoverEvent>>,
}

impl FailoverEngine {
    /// Create an engine with the given configuration
    #[must_use]
    pub fn new(config: FailoverEngineConfig) -> Self {
        if !config.scoring.is_normalized() {
            warn!("scoring weights do not sum to 1.0; composite scores will be skewed");
        }
        info!(
            default_strategy = %config.default_strategy,
            failure_threshold = config.circuit.failure_threshold,
            open_timeout_secs = config.circuit.open_timeout.as_secs(),
            "failover engine initialized"
        );

        Self {
            config,
            store: HealthStore::new(),
            stats: EngineStats::default(),
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Get configuration
    #[must_use]
    pub const fn config(&self) -> &FailoverEngineConfig {
        &self.config
    }

    /// Select the best available plugin for one request
    ///
    /// Runs the caller's exclusion filter, a lazy circuit-breaker pass over
    /// every surviving candidate, drops quarantined plugins, and dispatches
    /// the requested strategy (engine default when `None`) over the healthy
    /// set. The winner's load counter is incremented as an in-flight
    /// reservation; the caller must close the loop with
    /// [`record_plugin_performance`](Self::record_plugin_performance).
    ///
    /// When no healthy plugin remains, at most one half-open candidate (the
    /// first in input order) is offered as a probe.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::NoCandidates`] when exclusions empty the
    /// candidate list, and [`FailoverError::AllCircuitsOpen`] when every
    /// surviving candidate is quarantined with no probe available.
    pub fn select_optimal_plugin(
        &self,
        candidates: &[String],
        context: &FailoverContext,
        strategy: Option<SelectionStrategy>,
    ) -> Result<FailoverResult> {
        let started = Instant::now();

        let remaining: Vec<&str> = candidates
            .iter()
            .map(String::as_str)
            .filter(|id| !context.excluded_plugins.contains(*id))
            .collect();

        if remaining.is_empty() {
            self.stats.failed_selections.fetch_add(1, Ordering::Relaxed);
            warn!(
                request_id = %context.request_id,
                submitted = candidates.len(),
                "no candidates remain after exclusions"
            );
            return Err(FailoverError::NoCandidates {
                request_id: context.request_id.clone(),
                submitted: candidates.len(),
                excluded: candidates.len(),
            });
        }

        // Lazy breaker pass over every surviving candidate, then partition:
        // closed circuits form the healthy set, the first half-open one is
        // remembered as the probe of last resort.
        let mut healthy: Vec<HealthMetrics> = Vec::with_capacity(remaining.len());
        let mut probe: Option<String> = None;
        for id in &remaining {
            let mut entry = self.store.get_or_create(id);
            if let Some(transition) =
                circuit_breaker::refresh(&mut entry, &self.config.circuit, started)
            {
                self.note_transition(id, transition);
            }
            match entry.circuit_state {
                CircuitState::Closed => healthy.push(entry.value().clone()),
                CircuitState::HalfOpen => {
                    if probe.is_none() {
                        probe = Some(entry.plugin_id.clone());
                    }
                }
                CircuitState::Open => {}
            }
        }

        if healthy.is_empty() {
            return self.probe_or_fail(remaining.len(), probe, context, strategy, started);
        }

        let strategy = strategy.unwrap_or(self.config.default_strategy);
        let Some(outcome) =
            strategies::dispatch(strategy, &healthy, context, &self.config.scoring, started)
        else {
            // Unreachable with a non-empty healthy set; stay total anyway.
            self.stats.failed_selections.fetch_add(1, Ordering::Relaxed);
            return Err(FailoverError::AllCircuitsOpen {
                request_id: context.request_id.clone(),
                candidates: remaining.len(),
            });
        };

        // Reservation, not yet committed to success or failure.
        self.store.get_or_create(&outcome.selected).current_load += 1;
        self.stats.selections.fetch_add(1, Ordering::Relaxed);

        let result = FailoverResult {
            selected_plugin: outcome.selected,
            strategy_used: strategy,
            selection_latency: started.elapsed(),
            confidence_score: outcome.confidence_score,
            backup_plugins: outcome.backup_plugins,
            selection_reasons: outcome.selection_reasons,
        };

        debug!(
            request_id = %context.request_id,
            selected = %result.selected_plugin,
            strategy = %strategy,
            confidence = result.confidence_score,
            latency_us = u64::try_from(result.selection_latency.as_micros()).unwrap_or(u64::MAX),
            "plugin selected"
        );

        Ok(result)
    }

    /// Report the outcome of a call the engine routed
    ///
    /// Never fails: an unknown plugin ID is treated as first-seen and gets a
    /// fresh record. Updates counters, streaks, the response-time EMA, and
    /// the stored reliability score, releases the load reservation (floored
    /// at zero), and runs the opportunistic breaker transitions.
    pub fn record_plugin_performance(
        &self,
        plugin_id: &str,
        success: bool,
        latency_secs: f64,
        context: &FailoverContext,
    ) {
        let now = Instant::now();

        let transition = {
            let mut entry = self.store.get_or_create(plugin_id);
            entry.record_outcome(success, latency_secs, self.config.learning_rate, now);
            entry.current_load = (entry.current_load - 1).max(0);

            if success {
                // A success may first surface an elapsed quarantine, then
                // close the circuit off the probe streak.
                let refreshed = circuit_breaker::refresh(&mut entry, &self.config.circuit, now);
                circuit_breaker::on_success(&mut entry, &self.config.circuit).or(refreshed)
            } else {
                circuit_breaker::on_failure(&mut entry, &self.config.circuit, now)
            }
        };

        if let Some(transition) = transition {
            self.note_transition(plugin_id, transition);
        }

        self.stats.outcomes_recorded.fetch_add(1, Ordering::Relaxed);
        debug!(
            request_id = %context.request_id,
            plugin_id,
            success,
            latency_secs,
            "performance recorded"
        );
    }

    /// Compute the pacing delay before retry number `retry_count`
    ///
    /// Pure computation; the caller owns the actual wait.
    #[must_use]
    pub fn calculate_retry_delay(&self, retry_count: u32) -> Duration {
        backoff::retry_delay(&self.config.retry, retry_count)
    }

    /// Per-plugin statistics for every plugin the engine has ever seen
    ///
    /// The output is serde-serializable as-is for logs and metrics sinks.
    #[must_use]
    pub fn get_statistics(&self) -> HashMap<String, PluginStats> {
        let now = Instant::now();
        self.store
            .snapshot_all()
            .into_iter()
            .map(|metrics| (metrics.plugin_id.clone(), metrics.stats(now)))
            .collect()
    }

    /// Engine-level counter snapshot
    #[must_use]
    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Reset one plugin to a pristine health record
    ///
    /// The declared region survives; it is registry metadata, not health.
    pub fn reset_plugin_metrics(&self, plugin_id: &str) {
        self.store.reset(plugin_id);
        info!(plugin_id, "plugin metrics reset");
    }

    /// Seed a plugin's declared region from the plugin registry
    ///
    /// Call before first use; the engine never discovers plugins on its own.
    pub fn set_plugin_region<T: Into<String>>(&self, plugin_id: &str, region: T) {
        self.store.set_region(plugin_id, region);
    }

    /// Recent failover incidents, oldest first, bounded history
    #[must_use]
    pub fn recent_events(&self) -> Vec<FailoverEvent> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.iter().cloned().collect()
    }

    fn probe_or_fail(
        &self,
        candidate_count: usize,
        probe: Option<String>,
        context: &FailoverContext,
        strategy: Option<SelectionStrategy>,
        started: Instant,
    ) -> Result<FailoverResult> {
        if let Some(plugin_id) = probe {
            self.store.get_or_create(&plugin_id).current_load += 1;
            self.stats.selections.fetch_add(1, Ordering::Relaxed);
            self.stats.probe_selections.fetch_add(1, Ordering::Relaxed);
            self.push_event(FailoverEvent {
                request_id: context.request_id.clone(),
                plugin_id: Some(plugin_id.clone()),
                reason: "all closed circuits exhausted; offering half-open probe".to_string(),
                at: started,
            });
            warn!(
                request_id = %context.request_id,
                plugin_id = %plugin_id,
                "no healthy plugin available; probing half-open candidate"
            );

            return Ok(FailoverResult {
                selected_plugin: plugin_id,
                strategy_used: strategy.unwrap_or(self.config.default_strategy),
                selection_latency: started.elapsed(),
                confidence_score: ENGINE_PROBE_CONFIDENCE,
                backup_plugins: Vec::new(),
                selection_reasons: vec![
                    "all closed circuits exhausted; probing half-open plugin".to_string(),
                ],
            });
        }

        self.stats.failed_selections.fetch_add(1, Ordering::Relaxed);
        self.push_event(FailoverEvent {
            request_id: context.request_id.clone(),
            plugin_id: None,
            reason: "all circuits open".to_string(),
            at: started,
        });
        warn!(
            request_id = %context.request_id,
            candidates = candidate_count,
            "all circuits open, no probe available"
        );

        Err(FailoverError::AllCircuitsOpen {
            request_id: context.request_id.clone(),
            candidates: candidate_count,
        })
    }

    fn note_transition(&self, plugin_id: &str, transition: CircuitTransition) {
        match transition.to {
            CircuitState::Open => {
                self.stats.circuit_opens.fetch_add(1, Ordering::Relaxed);
                warn!(plugin_id, from = %transition.from, "circuit opened");
            }
            CircuitState::Closed => {
                self.stats.circuit_closes.fetch_add(1, Ordering::Relaxed);
                info!(plugin_id, "circuit closed, plugin recovered");
            }
            CircuitState::HalfOpen => {
                debug!(plugin_id, "circuit half-open, probe permitted");
            }
        }
    }

    fn push_event(&self, event: FailoverEvent) {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.push_back(event);
        while events.len() > ENGINE_MAX_EVENTS_HISTORY {
            events.pop_front();
        }
    }
}

impl Default for FailoverEngine {
    fn default() -> Self {
        Self::new(FailoverEngineConfig::default())
    }
}
