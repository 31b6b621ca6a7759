//! # Meridian Failover Engine Integration Tests
//!
//! End-to-end scenarios exercising the public engine contract: selection
//! over live health records, circuit breaker lifecycles, half-open probing,
//! retry pacing, and statistics export.
//!
//! ## Test Categories:
//! - Weighted selection over mixed-health plugin pools
//! - Circuit breaker open/half-open/close lifecycle through the public API
//! - Exclusion filtering and systemic-outage signalling
//! - Retry-delay pacing bounds
//! - Statistics and event-history export

use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;

use failover_core::{CircuitState, FailoverError, SelectionStrategy};
use meridian_tests::{
    context, engine, engine_with_open_timeout, init_tracing, open_circuit, pool, record_outcomes,
};

/// Breaker quarantine short enough to elapse inside a test
const TEST_OPEN_TIMEOUT: Duration = Duration::from_millis(50);

/// Comfortably past the test quarantine
const TEST_TIMEOUT_SLACK: Duration = Duration::from_millis(80);

#[test]
fn test_weighted_selection_prefers_healthy_fast_plugin() {
    init_tracing();
    let engine = engine();

    // A: 99% success at 100ms. One early failure so the rate is real.
    engine.record_plugin_performance("plugin-a", false, 0.1, &context("seed"));
    record_outcomes(&engine, "plugin-a", true, 0.1, 99);

    // B: 50% success at 2s.
    for _ in 0..50 {
        engine.record_plugin_performance("plugin-b", false, 2.0, &context("seed"));
        engine.record_plugin_performance("plugin-b", true, 2.0, &context("seed"));
    }

    // C: failure streak at the default threshold; breaker opens.
    open_circuit(&engine, "plugin-c");
    assert_eq!(
        engine.get_statistics()["plugin-c"].circuit_state,
        CircuitState::Open
    );

    let result = engine
        .select_optimal_plugin(
            &pool(&["plugin-a", "plugin-b", "plugin-c"]),
            &context("req-1"),
            Some(SelectionStrategy::Intelligent),
        )
        .unwrap();

    assert_eq!(result.selected_plugin, "plugin-a");
    assert_eq!(result.backup_plugins, vec!["plugin-b"]); // C is quarantined
    assert!(result.confidence_score > 0.0);
    assert!(result
        .selection_reasons
        .iter()
        .any(|reason| reason.contains("success rate")));
}

#[test]
fn test_failure_streak_opens_circuit_exactly_at_threshold() {
    let engine = engine();
    let threshold = engine.config().circuit.failure_threshold;

    record_outcomes(&engine, "shaky", false, 1.0, threshold - 1);
    assert_eq!(
        engine.get_statistics()["shaky"].circuit_state,
        CircuitState::Closed
    );

    record_outcomes(&engine, "shaky", false, 1.0, 1);
    let stats = engine.get_statistics();
    assert_eq!(stats["shaky"].circuit_state, CircuitState::Open);
    assert_eq!(stats["shaky"].consecutive_failures, threshold);
    assert!(stats["shaky"].secs_since_circuit_opened.is_some());
    assert_eq!(engine.stats().circuit_opens, 1);
}

#[test]
fn test_counter_identity_holds_after_every_outcome() {
    let engine = engine();
    let ctx = context("req-1");

    for i in 0..50_u32 {
        engine.record_plugin_performance("plugin", i % 3 == 0, 0.4, &ctx);
        let stats = engine.get_statistics();
        let entry = &stats["plugin"];
        assert_eq!(entry.total_requests, entry.success_count + entry.failure_count);
        assert!(entry.consecutive_failures == 0 || entry.consecutive_successes == 0);
    }
}

#[test]
fn test_excluding_every_candidate_is_a_caller_error() {
    let engine = engine();
    let ctx = context("req-1").with_excluded_plugin("only");

    let error = engine
        .select_optimal_plugin(&pool(&["only"]), &ctx, None)
        .unwrap_err();
    assert!(matches!(error, FailoverError::NoCandidates { .. }));
    assert!(!error.is_systemic());
}

#[test]
fn test_all_circuits_open_is_systemic() {
    let engine = engine();
    open_circuit(&engine, "p1");
    open_circuit(&engine, "p2");

    let error = engine
        .select_optimal_plugin(&pool(&["p1", "p2"]), &context("req-1"), None)
        .unwrap_err();
    assert!(matches!(error, FailoverError::AllCircuitsOpen { .. }));
    assert!(error.is_systemic());
    assert_eq!(error.category(), "all_circuits_open");

    // The incident lands in the bounded event history.
    let events = engine.recent_events();
    assert!(events.iter().any(|event| event.reason.contains("all circuits open")));
}

#[test]
fn test_elapsed_quarantine_offers_exactly_one_probe() {
    let engine = engine_with_open_timeout(TEST_OPEN_TIMEOUT);
    open_circuit(&engine, "first");
    open_circuit(&engine, "second");

    thread::sleep(TEST_TIMEOUT_SLACK);

    let result = engine
        .select_optimal_plugin(&pool(&["first", "second"]), &context("req-1"), None)
        .unwrap();

    // Both quarantines elapsed; only the first candidate is offered.
    assert_eq!(result.selected_plugin, "first");
    assert!(result.backup_plugins.is_empty());
    assert!(result
        .selection_reasons
        .iter()
        .any(|reason| reason.contains("probing half-open")));
    assert_eq!(engine.stats().probe_selections, 1);

    let events = engine.recent_events();
    assert!(events
        .iter()
        .any(|event| event.plugin_id.as_deref() == Some("first")));
}

#[test]
fn test_probe_successes_close_the_circuit() {
    let engine = engine_with_open_timeout(TEST_OPEN_TIMEOUT);
    open_circuit(&engine, "healing");
    thread::sleep(TEST_TIMEOUT_SLACK);

    let result = engine
        .select_optimal_plugin(&pool(&["healing"]), &context("req-1"), None)
        .unwrap();
    assert_eq!(result.selected_plugin, "healing");

    let threshold = engine.config().circuit.success_threshold;
    record_outcomes(&engine, "healing", true, 0.2, threshold);

    let stats = engine.get_statistics();
    assert_eq!(stats["healing"].circuit_state, CircuitState::Closed);
    assert_eq!(stats["healing"].consecutive_failures, 0);
    assert_eq!(engine.stats().circuit_closes, 1);
}

#[test]
fn test_probe_failure_reopens_immediately() {
    let engine = engine_with_open_timeout(TEST_OPEN_TIMEOUT);
    open_circuit(&engine, "broken");
    thread::sleep(TEST_TIMEOUT_SLACK);

    // Probe is offered, then fails: the breaker must reopen with a fresh
    // quarantine rather than keep routing live traffic at a broken plugin.
    let result = engine
        .select_optimal_plugin(&pool(&["broken"]), &context("req-1"), None)
        .unwrap();
    engine.record_plugin_performance(&result.selected_plugin, false, 1.0, &context("req-1"));

    assert_eq!(
        engine.get_statistics()["broken"].circuit_state,
        CircuitState::Open
    );

    // The fresh quarantine has not elapsed, so selection now fails hard.
    let error = engine
        .select_optimal_plugin(&pool(&["broken"]), &context("req-2"), None)
        .unwrap_err();
    assert!(matches!(error, FailoverError::AllCircuitsOpen { .. }));
}

#[test]
fn test_weighted_selection_is_idempotent_for_stable_snapshots() {
    let engine = engine();
    record_outcomes(&engine, "steady", true, 0.3, 20);
    record_outcomes(&engine, "laggy", true, 1.8, 20);

    let first = engine
        .select_optimal_plugin(&pool(&["steady", "laggy"]), &context("req-1"), None)
        .unwrap();
    let second = engine
        .select_optimal_plugin(&pool(&["steady", "laggy"]), &context("req-2"), None)
        .unwrap();

    assert_eq!(first.selected_plugin, second.selected_plugin);
    assert_eq!(first.selected_plugin, "steady");
}

#[test]
fn test_retry_delays_grow_and_respect_the_cap() {
    let engine = engine();
    let max_delay = engine.config().retry.max_delay;

    let mut previous = Duration::ZERO;
    for retry in 0..8_u32 {
        let delay = engine.calculate_retry_delay(retry);
        assert!(delay <= max_delay);
        assert!(delay >= previous || delay == max_delay);
        previous = delay;
    }

    assert_eq!(engine.calculate_retry_delay(64), max_delay);
}

#[test]
fn test_least_connections_spreads_reservations() {
    let engine = engine();
    record_outcomes(&engine, "a", true, 0.5, 5);
    record_outcomes(&engine, "b", true, 0.5, 5);

    // Two selections without outcome reports: the second must move to the
    // plugin that does not hold the first reservation.
    let first = engine
        .select_optimal_plugin(
            &pool(&["a", "b"]),
            &context("req-1"),
            Some(SelectionStrategy::LeastConnections),
        )
        .unwrap();
    let second = engine
        .select_optimal_plugin(
            &pool(&["a", "b"]),
            &context("req-2"),
            Some(SelectionStrategy::LeastConnections),
        )
        .unwrap();

    assert_eq!(first.selected_plugin, "a"); // tie breaks to input order
    assert_eq!(second.selected_plugin, "b");
    assert_eq!(second.strategy_used, SelectionStrategy::LeastConnections);
}

#[test]
fn test_fastest_response_tracks_recorded_latency() {
    let engine = engine();
    record_outcomes(&engine, "tortoise", true, 1.5, 10);
    record_outcomes(&engine, "hare", true, 0.2, 10);

    let result = engine
        .select_optimal_plugin(
            &pool(&["tortoise", "hare"]),
            &context("req-1"),
            Some(SelectionStrategy::FastestResponse),
        )
        .unwrap();
    assert_eq!(result.selected_plugin, "hare");
    assert_eq!(result.backup_plugins, vec!["tortoise"]);
}

#[test]
fn test_geographic_affinity_honors_preference_order() {
    let engine = engine();
    engine.set_plugin_region("eu-feed", "eu-west");
    engine.set_plugin_region("us-feed", "us-east");
    record_outcomes(&engine, "eu-feed", true, 0.4, 5);
    record_outcomes(&engine, "us-feed", true, 0.4, 5);

    let ctx = context("req-1").with_preferred_regions(["us-east", "eu-west"]);
    let result = engine
        .select_optimal_plugin(
            &pool(&["eu-feed", "us-feed"]),
            &ctx,
            Some(SelectionStrategy::GeographicAffinity),
        )
        .unwrap();

    assert_eq!(result.selected_plugin, "us-feed");
    assert_eq!(result.strategy_used, SelectionStrategy::GeographicAffinity);
    assert!((result.confidence_score - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_weighted_round_robin_reports_fixed_confidence() {
    let engine = engine();
    record_outcomes(&engine, "a", true, 0.5, 10);
    record_outcomes(&engine, "b", true, 0.5, 10);

    fastrand::seed(3);
    let result = engine
        .select_optimal_plugin(
            &pool(&["a", "b"]),
            &context("req-1"),
            Some(SelectionStrategy::WeightedRoundRobin),
        )
        .unwrap();
    assert!((result.confidence_score - 0.8).abs() < f64::EPSILON);
    assert!(result.selected_plugin == "a" || result.selected_plugin == "b");
}

#[test]
fn test_statistics_serialize_for_observability_sinks() {
    let engine = engine();
    engine.set_plugin_region("feed", "eu-west");
    record_outcomes(&engine, "feed", true, 0.25, 12);
    record_outcomes(&engine, "feed", false, 0.9, 1);

    let stats = engine.get_statistics();
    let json = serde_json::to_string(&stats).unwrap();
    assert!(json.contains("\"plugin_id\":\"feed\""));
    assert!(json.contains("\"geographic_region\":\"eu-west\""));
    assert!(json.contains("\"success_rate\""));

    let engine_stats = serde_json::to_string(&engine.stats()).unwrap();
    assert!(engine_stats.contains("\"outcomes_recorded\":13"));
}

#[test]
fn test_reset_restores_pristine_record_but_keeps_region() {
    let engine = engine();
    engine.set_plugin_region("feed", "ap-east");
    open_circuit(&engine, "feed");

    engine.reset_plugin_metrics("feed");

    let stats = engine.get_statistics();
    let entry = &stats["feed"];
    assert_eq!(entry.circuit_state, CircuitState::Closed);
    assert_eq!(entry.total_requests, 0);
    assert_eq!(entry.consecutive_failures, 0);
    assert_eq!(entry.geographic_region.as_deref(), Some("ap-east"));

    // Usable again right away.
    let result = engine
        .select_optimal_plugin(&pool(&["feed"]), &context("req-1"), None)
        .unwrap();
    assert_eq!(result.selected_plugin, "feed");
}

#[test]
fn test_backups_are_ranked_and_capped_at_two() {
    let engine = engine();
    record_outcomes(&engine, "best", true, 0.1, 20);
    record_outcomes(&engine, "good", true, 0.5, 20);
    record_outcomes(&engine, "fair", true, 1.0, 20);
    record_outcomes(&engine, "poor", true, 2.5, 20);

    let result = engine
        .select_optimal_plugin(
            &pool(&["poor", "fair", "good", "best"]),
            &context("req-1"),
            None,
        )
        .unwrap();

    assert_eq!(result.selected_plugin, "best");
    assert_eq!(result.backup_plugins, vec!["good", "fair"]);
}

#[test]
fn test_unreported_work_keeps_reservation_in_load_signal() {
    let engine = engine();
    record_outcomes(&engine, "feed", true, 0.2, 5);

    let _ = engine
        .select_optimal_plugin(&pool(&["feed"]), &context("req-1"), None)
        .unwrap();
    assert_eq!(engine.get_statistics()["feed"].current_load, 1);

    // A late failure report (e.g. caller-side timeout) releases it.
    engine.record_plugin_performance("feed", false, 30.0, &context("req-1"));
    assert_eq!(engine.get_statistics()["feed"].current_load, 0);
}
