//! End-to-end pipeline tests: filename -> guess -> candidates -> score ->
//! route -> execute, against the in-memory store and a temp library tree.

mod common;

use assert_matches::assert_matches;
use common::{matrix_candidate, thing_candidates, StubProvider, TestHarness};

use reelsort::db::models::{HistoryStatus, QueueStatus};
use reelsort::db::queries::{history, queue};
use reelsort::matcher::{tier, Tier, YearSignal};
use reelsort::routing::{route, RejectReason, RoutingDecision, RoutingPolicy};

const POLICY: RoutingPolicy = RoutingPolicy {
    auto_ingest: true,
    auto_threshold: 0.85,
};

// ---------------------------------------------------------------------------
// High-confidence auto-ingest
// ---------------------------------------------------------------------------

#[tokio::test]
async fn matrix_auto_ingests_end_to_end() {
    let harness = TestHarness::new();
    let provider = StubProvider::with_candidates(vec![matrix_candidate()]);
    let matcher = harness.matcher(provider.clone());
    let executor = harness.executor(provider);

    let source = harness.write_source("The.Matrix.1999.1080p.BluRay.mkv", b"matrix bytes");

    // Identification: exact title, exact year, type match, high popularity.
    let match_set = matcher.match_file("The.Matrix.1999.1080p.BluRay.mkv").await;
    let top = match_set.top().expect("expected a candidate");
    assert!(top.confidence >= 0.85, "got {}", top.confidence);
    assert!((0.90..=1.0).contains(&top.confidence));
    assert_eq!(tier(top.confidence, 0.85, 0.70), Tier::High);
    assert_eq!(top.breakdown.year_signal, YearSignal::Exact);

    // Routing: clears the bar, no prior history -> auto-ingest.
    let decision = {
        let conn = harness.conn();
        route(&conn, &source, &match_set, &POLICY).unwrap()
    };
    let m = assert_matches!(decision, RoutingDecision::AutoIngest(m) => m);

    // Execution: copy, verify, history row.
    let record = executor.execute(&m, &match_set.guess, &source).await.unwrap();
    assert_eq!(record.status, HistoryStatus::Success);
    assert_eq!(record.external_id, 603);

    let destination = harness
        .library_root()
        .join("Movies/The Matrix (1999) {tmdb-603}/The Matrix (1999) {tmdb-603}.mkv");
    assert!(destination.exists());
    assert_eq!(std::fs::read(&destination).unwrap(), b"matrix bytes");
    // Source is left in place; cleanup is the operator's call.
    assert!(source.exists());

    // Duplicate guard: the same content never auto-ingests twice.
    let second = harness.write_source("The Matrix 1999 REMUX.mkv", b"matrix again");
    let match_set2 = matcher.match_file("The Matrix 1999 REMUX.mkv").await;
    let decision2 = {
        let conn = harness.conn();
        route(&conn, &second, &match_set2, &POLICY).unwrap()
    };
    assert_eq!(
        decision2,
        RoutingDecision::Reject(RejectReason::Duplicate { external_id: 603 })
    );
}

// ---------------------------------------------------------------------------
// Ambiguous file -> queue -> approve
// ---------------------------------------------------------------------------

#[tokio::test]
async fn yearless_file_queues_then_approve_ingests() {
    let harness = TestHarness::new();
    let provider = StubProvider::with_candidates(thing_candidates());
    let matcher = harness.matcher(provider.clone());
    let executor = harness.executor(provider);

    let source = harness.write_source("The.Thing.mkv", b"which thing is this");

    let match_set = matcher.match_file("The.Thing.mkv").await;
    assert_eq!(match_set.ranked.len(), 2);
    for m in &match_set.ranked {
        // No year in the guess: both candidates land below the high tier.
        assert!(m.confidence < 0.85);
        assert_eq!(m.breakdown.year_signal, YearSignal::NoGuessYear);
    }
    // Ordered by confidence descending.
    assert!(match_set.ranked[0].confidence >= match_set.ranked[1].confidence);
    assert_eq!(match_set.ranked[0].candidate.external_id, 1091);

    let decision = {
        let conn = harness.conn();
        route(&conn, &source, &match_set, &POLICY).unwrap()
    };
    let queued = assert_matches!(decision, RoutingDecision::Queue(q) => q);
    assert_eq!(queued.len(), 2);

    // The queue item carries an actionable diagnosis.
    let item = {
        let conn = harness.conn();
        queue::get_pending_by_path(&conn, &source.to_string_lossy())
            .unwrap()
            .expect("expected a pending item")
    };
    assert!(item.reason.as_deref().unwrap().contains("no year in the filename"));
    assert_eq!(item.candidates.len(), 2);

    // Approve executes the stored top candidate.
    let record = executor.approve(&source.to_string_lossy()).await.unwrap();
    assert_eq!(record.status, HistoryStatus::Success);
    assert_eq!(record.external_id, 1091);

    let destination = harness
        .library_root()
        .join("Movies/The Thing (1982) {tmdb-1091}/The Thing (1982) {tmdb-1091}.mkv");
    assert!(destination.exists());

    let item = {
        let conn = harness.conn();
        queue::get_latest_by_path(&conn, &source.to_string_lossy())
            .unwrap()
            .unwrap()
    };
    assert_eq!(item.status, QueueStatus::Approved);

    // A decided item cannot be approved again.
    assert!(executor.approve(&source.to_string_lossy()).await.is_err());
}

// ---------------------------------------------------------------------------
// Reject flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_item_is_terminal_but_auditable() {
    let harness = TestHarness::new();
    let provider = StubProvider::with_candidates(thing_candidates());
    let matcher = harness.matcher(provider.clone());
    let executor = harness.executor(provider);

    let source = harness.write_source("The.Thing.mkv", b"nope");
    let match_set = matcher.match_file("The.Thing.mkv").await;
    {
        let conn = harness.conn();
        route(&conn, &source, &match_set, &POLICY).unwrap();
    }

    executor
        .reject(&source.to_string_lossy(), Some("wrong movie"))
        .unwrap();

    let conn = harness.conn();
    assert!(queue::get_pending_by_path(&conn, &source.to_string_lossy())
        .unwrap()
        .is_none());
    // Soft state: the row survives with its decision.
    let item = queue::get_latest_by_path(&conn, &source.to_string_lossy())
        .unwrap()
        .unwrap();
    assert_eq!(item.status, QueueStatus::Rejected);
    assert!(item.decided_at.is_some());

    // Nothing was copied and no history row exists.
    assert!(history::list(&conn, None, 10).unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Provider outage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn provider_outage_becomes_no_match_reject() {
    let harness = TestHarness::new();
    let provider = StubProvider::failing();
    let matcher = harness.matcher(provider);

    let source = harness.write_source("The.Matrix.1999.mkv", b"bytes");
    let match_set = matcher.match_file("The.Matrix.1999.mkv").await;
    assert!(match_set.ranked.is_empty());

    let decision = {
        let conn = harness.conn();
        route(&conn, &source, &match_set, &POLICY).unwrap()
    };
    assert_eq!(decision, RoutingDecision::Reject(RejectReason::NoMatch));

    // Transient failure leaves no durable state behind.
    let conn = harness.conn();
    assert_eq!(queue::count_pending(&conn).unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Copy failure rollback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn copy_failure_writes_failed_history_and_rolls_back() {
    let harness = TestHarness::new();
    let provider = StubProvider::with_candidates(vec![matrix_candidate()]);
    let matcher = harness.matcher(provider.clone());
    let executor = harness.executor(provider);

    // Source never exists: the copy must fail.
    let source = harness.ingest_dir().join("The.Matrix.1999.mkv");
    let match_set = matcher.match_file("The.Matrix.1999.mkv").await;
    let top = match_set.top().unwrap().clone();

    let record = executor.execute(&top, &match_set.guess, &source).await.unwrap();
    assert_eq!(record.status, HistoryStatus::Failed);
    assert!(record.error.is_some());
    assert!(record.destination_path.is_none());

    // No partial destination artifacts.
    let movie_dir = harness.library_root().join("Movies");
    assert!(!movie_dir.join("The Matrix (1999) {tmdb-603}").exists());

    // A failed ingest is not a duplicate: the same id can be retried.
    let conn = harness.conn();
    assert!(!history::is_duplicate(&conn, 603).unwrap());
}
