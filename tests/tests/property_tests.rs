//! # Meridian Failover Engine Property Tests
//!
//! Property-based coverage of the accounting invariants and the retry
//! pacing contract: for every sequence of recorded outcomes the health
//! record stays internally consistent, and for every retry count the
//! computed delay respects its bounds.

use proptest::prelude::*;

use failover_core::{
    retry_delay, CircuitState, FailoverEngine, RetryConfig, SelectionStrategy,
};
use meridian_tests::{context, engine, pool};

/// One reported outcome: success flag and latency in seconds
fn outcome_strategy() -> impl Strategy<Value = (bool, f64)> {
    (any::<bool>(), 0.0_f64..10.0)
}

proptest! {
    #[test]
    fn prop_counter_identity_for_all_outcome_sequences(
        outcomes in proptest::collection::vec(outcome_strategy(), 1..200)
    ) {
        let engine = engine();
        let ctx = context("prop");

        for (success, latency) in outcomes {
            engine.record_plugin_performance("plugin", success, latency, &ctx);

            let stats = engine.get_statistics();
            let entry = &stats["plugin"];
            prop_assert_eq!(entry.total_requests, entry.success_count + entry.failure_count);
            prop_assert!(entry.consecutive_failures == 0 || entry.consecutive_successes == 0);
            prop_assert!(entry.current_load >= 0);
            prop_assert!((0.0..=1.0).contains(&entry.reliability_score));
            prop_assert!((0.0..=1.0).contains(&entry.success_rate));
            prop_assert!(entry.avg_response_time_secs >= 0.0);
        }
    }

    #[test]
    fn prop_breaker_opens_exactly_at_the_failure_threshold(
        threshold in 1_u32..20,
        latency in 0.0_f64..5.0
    ) {
        let engine = FailoverEngine::new(failover_core::FailoverEngineConfig {
            circuit: failover_core::CircuitBreakerConfig {
                failure_threshold: threshold,
                ..failover_core::CircuitBreakerConfig::default()
            },
            ..failover_core::FailoverEngineConfig::default()
        });
        let ctx = context("prop");

        for reported in 1..=threshold {
            engine.record_plugin_performance("plugin", false, latency, &ctx);
            let state = engine.get_statistics()["plugin"].circuit_state;
            if reported < threshold {
                prop_assert_eq!(state, CircuitState::Closed);
            } else {
                prop_assert_eq!(state, CircuitState::Open);
            }
        }
    }

    #[test]
    fn prop_retry_delay_never_exceeds_the_cap(retry_count in 0_u32..1000) {
        let config = RetryConfig::default();
        let delay = retry_delay(&config, retry_count);
        prop_assert!(delay <= config.max_delay);
        prop_assert!(delay >= std::time::Duration::ZERO);
    }

    #[test]
    fn prop_retry_delay_is_at_least_the_raw_backoff_until_capped(retry_count in 0_u32..8) {
        let config = RetryConfig::default();
        let raw = config.base_delay.as_secs_f64()
            * config.backoff_multiplier.powi(retry_count as i32);
        let floor = raw.min(config.max_delay.as_secs_f64());

        let delay = retry_delay(&config, retry_count).as_secs_f64();
        prop_assert!(delay + 1e-9 >= floor);
    }

    #[test]
    fn prop_selection_picks_from_the_candidate_pool(
        pool_size in 1_usize..12,
        strategy_index in 0_usize..5
    ) {
        let ids: Vec<String> = (0..pool_size).map(|i| format!("plugin-{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        let engine = engine();
        let ctx = context("prop");
        for id in &ids {
            engine.record_plugin_performance(id, true, 0.2, &ctx);
        }

        let strategy = match strategy_index {
            0 => SelectionStrategy::Intelligent,
            1 => SelectionStrategy::WeightedRoundRobin,
            2 => SelectionStrategy::LeastConnections,
            3 => SelectionStrategy::FastestResponse,
            _ => SelectionStrategy::GeographicAffinity,
        };

        let result = engine
            .select_optimal_plugin(&pool(&id_refs), &ctx, Some(strategy))
            .expect("healthy pool must yield a selection");

        prop_assert!(ids.contains(&result.selected_plugin));
        prop_assert!(result.backup_plugins.len() <= 2);
        prop_assert!(!result.backup_plugins.contains(&result.selected_plugin));
        for backup in &result.backup_plugins {
            prop_assert!(ids.contains(backup));
        }
        prop_assert!((0.0..=1.0).contains(&result.confidence_score));
        prop_assert!(!result.selection_reasons.is_empty());
    }
}
