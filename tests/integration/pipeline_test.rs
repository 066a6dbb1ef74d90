//! Full runs through the pipeline against the mock backoffice.

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use crate::mock_transport::{
    bet_json, harness, markets_json, matches_json, profile_json, sports_json, Harness,
    MockTransport, AUTH_PATH,
};
use sharpxch::engine::{Executor, Pipeline, PipelineOptions};
use sharpxch::storage::SnapshotStore;
use sharpxch::strategy::{estimates_from, DailyLossGuard, EstimateBook, ValueBettingStrategy, ValueConfig};

fn backoffice() -> MockTransport {
    MockTransport::new()
        .with_login()
        .respond_json("GET", "/backoffice/api/v2/clients/profile", profile_json())
        .respond_json("GET", "/backoffice/api/sports", sports_json())
        .respond_json("GET", "/backoffice/api/matches", matches_json(&["m-1", "m-2"]))
}

fn book() -> EstimateBook {
    let mut book = EstimateBook::new();
    // Arsenal at 2.0 with p = 0.8: edge 0.3, a clear value bet.
    book.insert("m-1", estimates_from([("Arsenal", dec!(0.8))]));
    book.insert("m-2", estimates_from([("Arsenal", dec!(0.8))]));
    book
}

fn pipeline(h: &Harness, estimates: EstimateBook, dry_run: bool) -> Pipeline {
    let executor = Executor::new(h.gateway.clone(), DailyLossGuard::new(dec!(500)), dry_run);
    Pipeline::new(
        h.gateway.clone(),
        ValueBettingStrategy::new(ValueConfig::default()),
        estimates,
        executor,
        PipelineOptions {
            sport_id: None,
            request_delay: Duration::ZERO,
        },
    )
}

#[tokio::test]
async fn test_auth_failure_aborts_run() {
    let h = harness(MockTransport::new().respond("POST", AUTH_PATH, 401, r#"{"error":"nope"}"#));
    let report = pipeline(&h, book(), true).run().await;

    assert!(report.aborted);
    assert!(!report.step("authenticate").unwrap().success);
    assert!(report.step("profile").is_none());
    assert_eq!(h.transport.total_calls(), 1);
}

#[tokio::test]
async fn test_profile_failure_aborts_run() {
    let h = harness(
        MockTransport::new()
            .with_login()
            .respond("GET", "/backoffice/api/v2/clients/profile", 500, "{}"),
    );
    let report = pipeline(&h, book(), true).run().await;

    assert!(report.aborted);
    assert!(report.step("authenticate").unwrap().success);
    assert!(!report.step("profile").unwrap().success);
    assert_eq!(h.transport.calls_to("/backoffice/api/matches"), 0);
}

#[tokio::test]
async fn test_sports_failure_is_not_fatal() {
    let h = harness(
        MockTransport::new()
            .with_login()
            .respond_json("GET", "/backoffice/api/v2/clients/profile", profile_json())
            .respond("GET", "/backoffice/api/sports", 502, "{}")
            .respond_json("GET", "/backoffice/api/matches", matches_json(&[])),
    );
    let report = pipeline(&h, book(), true).run().await;

    assert!(!report.aborted);
    assert!(!report.step("sports").unwrap().success);
    assert!(report.step("matches").unwrap().success);
}

#[tokio::test]
async fn test_matches_failure_aborts_run() {
    let h = harness(
        MockTransport::new()
            .with_login()
            .respond_json("GET", "/backoffice/api/v2/clients/profile", profile_json())
            .respond_json("GET", "/backoffice/api/sports", sports_json())
            .respond("GET", "/backoffice/api/matches", 503, "{}"),
    );
    let report = pipeline(&h, book(), true).run().await;
    assert!(report.aborted);
    assert!(report.execution.is_none());
}

#[tokio::test]
async fn test_continues_past_failed_market_fetch() {
    let h = harness(
        backoffice()
            .respond("GET", "/backoffice/api/markets/m-1", 500, r#"{"error":"boom"}"#)
            .respond_json("GET", "/backoffice/api/markets/m-2", markets_json("m-2", 2.0, 3.5)),
    );
    let report = pipeline(&h, book(), true).run().await;

    assert!(!report.aborted);
    assert!(!report.step("markets:m-1").unwrap().success);
    assert!(report.step("markets").unwrap().success);
    assert_eq!(report.value_bets.len(), 1);
    assert_eq!(report.value_bets[0].selection.id, "m-2-h");
}

#[tokio::test]
async fn test_dry_run_places_nothing() {
    let h = harness(
        backoffice()
            .respond_json("GET", "/backoffice/api/markets/m-1", markets_json("m-1", 2.0, 3.5))
            .respond_json("GET", "/backoffice/api/markets/m-2", markets_json("m-2", 2.0, 3.5)),
    );
    let report = pipeline(&h, book(), true).run().await;

    let execution = report.execution.unwrap();
    assert_eq!(execution.executed.len(), 2);
    assert_eq!(execution.total_staked, dec!(200));
    assert_eq!(h.transport.calls_to("/backoffice/api/bets"), 0);
}

#[tokio::test]
async fn test_live_run_places_value_bets() {
    let h = harness(
        backoffice()
            .respond_json("GET", "/backoffice/api/markets/m-1", markets_json("m-1", 2.0, 3.5))
            .respond_json("GET", "/backoffice/api/markets/m-2", markets_json("m-2", 1.2, 6.0))
            .respond_json("POST", "/backoffice/api/bets", bet_json("b-1", 100.0, 2.0)),
    );
    let report = pipeline(&h, book(), false).run().await;

    // m-2's Arsenal price of 1.2 is below min odds and has negative edge.
    assert_eq!(report.value_bets.len(), 1);
    let execution = report.execution.unwrap();
    assert_eq!(execution.executed.len(), 1);
    assert_eq!(h.transport.calls_to("/backoffice/api/bets"), 1);
    assert_eq!(h.transport.auth_calls(), 1);
}

#[tokio::test]
async fn test_invalid_odds_market_is_skipped() {
    let h = harness(
        backoffice()
            .respond_json("GET", "/backoffice/api/markets/m-1", markets_json("m-1", 1.0, 3.5))
            .respond_json("GET", "/backoffice/api/markets/m-2", markets_json("m-2", 2.0, 3.5)),
    );
    let report = pipeline(&h, book(), true).run().await;

    assert!(!report.aborted);
    assert!(!report.step("scan:m-1-mr").unwrap().success);
    assert_eq!(report.value_bets.len(), 1);
}

#[tokio::test]
async fn test_matches_without_estimates_are_ignored() {
    let h = harness(
        backoffice()
            .respond_json("GET", "/backoffice/api/markets/m-1", markets_json("m-1", 2.0, 3.5))
            .respond_json("GET", "/backoffice/api/markets/m-2", markets_json("m-2", 2.0, 3.5)),
    );
    let report = pipeline(&h, EstimateBook::new(), true).run().await;

    assert!(report.value_bets.is_empty());
    assert!(report.execution.unwrap().executed.is_empty());
}

#[tokio::test]
async fn test_sport_filter_passed_through() {
    let h = harness(
        MockTransport::new()
            .with_login()
            .respond_json("GET", "/backoffice/api/v2/clients/profile", profile_json())
            .respond_json("GET", "/backoffice/api/sports", sports_json())
            .respond_json("GET", "/backoffice/api/matches?sportId=2", matches_json(&[])),
    );
    let executor = Executor::new(h.gateway.clone(), DailyLossGuard::new(dec!(500)), true);
    let mut pipeline = Pipeline::new(
        h.gateway.clone(),
        ValueBettingStrategy::new(ValueConfig::default()),
        EstimateBook::new(),
        executor,
        PipelineOptions {
            sport_id: Some(2),
            request_delay: Duration::ZERO,
        },
    );
    let report = pipeline.run().await;

    assert!(!report.aborted);
    assert_eq!(h.transport.calls_to("/backoffice/api/matches?sportId=2"), 1);
}

#[tokio::test]
async fn test_snapshots_written() {
    let dir = std::env::temp_dir().join(format!("sharpxch_pipeline_{}", uuid::Uuid::new_v4()));
    let store = Arc::new(SnapshotStore::new(&dir).unwrap());
    let h = harness(
        backoffice()
            .respond_json("GET", "/backoffice/api/markets/m-1", markets_json("m-1", 2.0, 3.5))
            .respond_json("GET", "/backoffice/api/markets/m-2", markets_json("m-2", 2.0, 3.5)),
    );

    let report = pipeline(&h, book(), true)
        .with_snapshots(store.clone())
        .run()
        .await;
    assert!(!report.aborted);

    let today = chrono::Utc::now().date_naive();
    assert_eq!(store.load_matches(today).unwrap().len(), 2);
    assert_eq!(store.load_match_markets("m-2", today).unwrap().len(), 1);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_second_run_respects_stakes_from_first() {
    let dir = std::env::temp_dir().join(format!("sharpxch_daily_{}", uuid::Uuid::new_v4()));
    let store = Arc::new(SnapshotStore::new(&dir).unwrap());
    let h = harness(
        backoffice()
            .respond_json("GET", "/backoffice/api/markets/m-1", markets_json("m-1", 2.0, 3.5))
            .respond_json("GET", "/backoffice/api/markets/m-2", markets_json("m-2", 1.2, 6.0))
            .respond_json("POST", "/backoffice/api/bets", bet_json("b-1", 100.0, 2.0)),
    );
    let today = chrono::Utc::now().date_naive();

    let live_run = |committed| {
        let executor = Executor::new(
            h.gateway.clone(),
            DailyLossGuard::with_committed(dec!(100), committed),
            false,
        )
        .with_snapshots(store.clone());
        Pipeline::new(
            h.gateway.clone(),
            ValueBettingStrategy::new(ValueConfig::default()),
            book(),
            executor,
            PipelineOptions::default(),
        )
    };

    let first = live_run(store.committed_stake(today).unwrap()).run().await;
    assert_eq!(first.execution.unwrap().executed.len(), 1);
    assert_eq!(store.committed_stake(today).unwrap(), dec!(100));

    // A fresh process picks up today's saved bets and stays within the limit.
    let second = live_run(store.committed_stake(today).unwrap()).run().await;
    let execution = second.execution.unwrap();
    assert!(execution.executed.is_empty());
    assert_eq!(execution.failed.len(), 1);
    assert!(execution.failed[0].reason.contains("risk limit"));
    assert_eq!(h.transport.calls_to("/backoffice/api/bets"), 1);

    std::fs::remove_dir_all(&dir).unwrap();
}
