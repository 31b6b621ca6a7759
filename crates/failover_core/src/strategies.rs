//! Selection strategies over the healthy candidate set
//!
//! Each strategy consumes health snapshots in caller-supplied candidate
//! order and produces a ranked choice: the selected plugin, up to two
//! backup alternates, ordered reasons, and a confidence score. Ties break
//! stably to the earliest candidate in input order so selection stays
//! deterministic under identical health snapshots.

use std::cmp::Ordering;
use std::time::Instant;

use crate::health::HealthMetrics;
use crate::scoring::{self, ScoringConfig};
use crate::types::{FailoverContext, SelectionStrategy};

/// Backup alternates carried in a selection outcome
pub const STRATEGY_MAX_BACKUPS: usize = 2;

/// Floor for average response time in the round-robin weight, so cold
/// plugins with a zero average cannot produce an infinite weight
pub const STRATEGY_MIN_RESPONSE_SECS: f64 = 0.001;

/// Fixed confidence reported by the weighted round-robin strategy
pub const STRATEGY_ROUND_ROBIN_CONFIDENCE: f64 = 0.8;

/// Fixed confidence reported by the least-connections strategy
pub const STRATEGY_LEAST_CONNECTIONS_CONFIDENCE: f64 = 0.7;

/// Fixed confidence reported by the fastest-response strategy
pub const STRATEGY_FASTEST_RESPONSE_CONFIDENCE: f64 = 0.8;

/// Ranked choice produced by a strategy
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    /// The winning plugin
    pub selected: String,

    /// Next-best alternates in rank order
    pub backup_plugins: Vec<String>,

    /// Human-readable ranking rationale
    pub selection_reasons: Vec<String>,

    /// Confidence in the choice (0.0-1.0)
    pub confidence_score: f64,
}

/// Run the requested strategy over the candidate snapshots
///
/// Returns `None` only for an empty candidate set; the orchestrator
/// guarantees a non-empty set before dispatching.
#[must_use]
pub fn dispatch(
    strategy: SelectionStrategy,
    candidates: &[HealthMetrics],
    context: &FailoverContext,
    config: &ScoringConfig,
    now: Instant,
) -> Option<StrategyOutcome> {
    if candidates.is_empty() {
        return None;
    }

    let outcome = match strategy {
        SelectionStrategy::Intelligent => select_intelligent(candidates, context, config, now),
        SelectionStrategy::WeightedRoundRobin => select_weighted_round_robin(candidates),
        SelectionStrategy::LeastConnections => select_least_connections(candidates),
        SelectionStrategy::FastestResponse => select_fastest_response(candidates),
        SelectionStrategy::GeographicAffinity => {
            select_geographic_affinity(candidates, context, config, now)
        }
    };

    Some(outcome)
}

/// Weighted multi-dimension scoring; highest composite score wins
fn select_intelligent(
    candidates: &[HealthMetrics],
    context: &FailoverContext,
    config: &ScoringConfig,
    now: Instant,
) -> StrategyOutcome {
    let scores: Vec<f64> = candidates
        .iter()
        .map(|metrics| scoring::final_score(metrics, context, config, now))
        .collect();

    let order = rank_descending(&scores);
    let best = order[0];
    let winner = &candidates[best];

    StrategyOutcome {
        selected: winner.plugin_id.clone(),
        backup_plugins: collect_backups(candidates, &order),
        selection_reasons: vec![
            format!("weighted score {:.3}", scores[best]),
            format!(
                "success rate {:.1}% over {} request(s)",
                winner.success_rate() * 100.0,
                winner.total_requests
            ),
        ],
        confidence_score: scores[best].clamp(0.0, 1.0),
    }
}

/// Weighted random draw over cumulative weights
///
/// Weight = success rate over average response time. A zero total weight
/// (e.g. a pool of cold plugins) degrades to a uniform draw.
fn select_weighted_round_robin(candidates: &[HealthMetrics]) -> StrategyOutcome {
    let weights: Vec<f64> = candidates
        .iter()
        .map(|metrics| {
            metrics.success_rate() / metrics.avg_response_time_secs.max(STRATEGY_MIN_RESPONSE_SECS)
        })
        .collect();
    let total: f64 = weights.iter().sum();

    let (pick, reason) = if total > 0.0 {
        let draw = fastrand::f64() * total;
        let mut cumulative = 0.0;
        let mut pick = candidates.len() - 1;
        for (index, weight) in weights.iter().enumerate() {
            cumulative += weight;
            if cumulative >= draw {
                pick = index;
                break;
            }
        }
        (
            pick,
            format!("draw weight {:.3} of total {:.3}", weights[pick], total),
        )
    } else {
        (
            fastrand::usize(..candidates.len()),
            "zero total weight; uniform draw".to_string(),
        )
    };

    let order = rank_descending(&weights);
    let backups = order
        .iter()
        .filter(|&&index| index != pick)
        .take(STRATEGY_MAX_BACKUPS)
        .map(|&index| candidates[index].plugin_id.clone())
        .collect();

    StrategyOutcome {
        selected: candidates[pick].plugin_id.clone(),
        backup_plugins: backups,
        selection_reasons: vec!["weighted round robin".to_string(), reason],
        confidence_score: STRATEGY_ROUND_ROBIN_CONFIDENCE,
    }
}

/// Smallest in-flight reservation counter wins
fn select_least_connections(candidates: &[HealthMetrics]) -> StrategyOutcome {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| candidates[a].current_load.cmp(&candidates[b].current_load));

    let winner = &candidates[order[0]];
    StrategyOutcome {
        selected: winner.plugin_id.clone(),
        backup_plugins: collect_backups(candidates, &order),
        selection_reasons: vec![format!("current load {}", winner.current_load)],
        confidence_score: STRATEGY_LEAST_CONNECTIONS_CONFIDENCE,
    }
}

/// Smallest average response time wins
fn select_fastest_response(candidates: &[HealthMetrics]) -> StrategyOutcome {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        candidates[a]
            .avg_response_time_secs
            .partial_cmp(&candidates[b].avg_response_time_secs)
            .unwrap_or(Ordering::Equal)
    });

    let winner = &candidates[order[0]];
    StrategyOutcome {
        selected: winner.plugin_id.clone(),
        backup_plugins: collect_backups(candidates, &order),
        selection_reasons: vec![format!(
            "avg response {:.3}s",
            winner.avg_response_time_secs
        )],
        confidence_score: STRATEGY_FASTEST_RESPONSE_CONFIDENCE,
    }
}

/// Preferred-region affinity ranking; delegates to weighted scoring when
/// the request carries no regional preference
fn select_geographic_affinity(
    candidates: &[HealthMetrics],
    context: &FailoverContext,
    config: &ScoringConfig,
    now: Instant,
) -> StrategyOutcome {
    if context.preferred_regions.is_empty() {
        let mut outcome = select_intelligent(candidates, context, config, now);
        outcome
            .selection_reasons
            .insert(0, "no preferred regions; delegated to weighted scoring".to_string());
        return outcome;
    }

    let scores: Vec<f64> = candidates
        .iter()
        .map(|metrics| scoring::geographic_score(metrics, context))
        .collect();

    let order = rank_descending(&scores);
    let best = order[0];
    let winner = &candidates[best];
    let region = winner.geographic_region.as_deref().unwrap_or("undeclared");

    StrategyOutcome {
        selected: winner.plugin_id.clone(),
        backup_plugins: collect_backups(candidates, &order),
        selection_reasons: vec![format!(
            "region {} scored {:.2} against preference list",
            region, scores[best]
        )],
        confidence_score: scores[best].clamp(0.0, 1.0),
    }
}

/// Indices sorted by score descending; stable, so earlier candidates win
/// ties
fn rank_descending(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));
    order
}

fn collect_backups(candidates: &[HealthMetrics], order: &[usize]) -> Vec<String> {
    order
        .iter()
        .skip(1)
        .take(STRATEGY_MAX_BACKUPS)
        .map(|&index| candidates[index].plugin_id.clone())
        .collect()
}
