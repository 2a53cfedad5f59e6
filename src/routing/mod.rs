//! Routing: decide auto-ingest vs. review queue vs. reject for a scored
//! match set, exactly once per path.
//!
//! The durable store is the single source of truth. Routing consults it
//! before mutating anything: a pending queue item for the path short-circuits
//! to the existing decision, and a successful history row for the top
//! candidate's external id trips the duplicate guard. Queue insertion happens
//! here and nowhere else, so re-routing a path can never create a second row.

use std::path::Path;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::db::queries::{history, queue};
use crate::error::Result;
use crate::matcher::{MatchResult, MatchSet, YearSignal};

/// Why a file was rejected rather than ingested or queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// The provider returned no candidates for the guess.
    NoMatch,
    /// The top candidate was already successfully ingested.
    Duplicate { external_id: u64 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NoMatch => write!(f, "no_match"),
            RejectReason::Duplicate { external_id } => {
                write!(f, "duplicate (tmdb-{external_id})")
            }
        }
    }
}

/// Terminal routing decision for one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoutingDecision {
    /// Confidence cleared the bar; ingest without review.
    AutoIngest(MatchResult),
    /// Hold for a human decision, candidates ordered by confidence.
    Queue(Vec<MatchResult>),
    /// Nothing to do; the reason is part of the audit surface.
    Reject(RejectReason),
}

/// The slice of configuration routing cares about.
#[derive(Debug, Clone, Copy)]
pub struct RoutingPolicy {
    pub auto_ingest: bool,
    pub auto_threshold: f64,
}

impl RoutingPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            auto_ingest: config.matching.auto_ingest,
            auto_threshold: config.matching.auto_threshold,
        }
    }
}

/// Route a scored match set for `path`.
///
/// Idempotent: identical inputs against identical store state produce the
/// same decision, and re-routing a path with a pending queue item returns
/// that item's decision instead of inserting another.
pub fn route(
    conn: &Connection,
    path: &Path,
    match_set: &MatchSet,
    policy: &RoutingPolicy,
) -> Result<RoutingDecision> {
    let path_str = path.to_string_lossy();

    // A pending review already owns this path.
    if let Some(existing) = queue::get_pending_by_path(conn, &path_str)? {
        debug!(path = %path_str, "already queued, returning existing decision");
        return Ok(RoutingDecision::Queue(existing.candidates));
    }

    let top = match match_set.top() {
        Some(top) => top,
        None => {
            info!(path = %path_str, "no candidates, rejecting");
            return Ok(RoutingDecision::Reject(RejectReason::NoMatch));
        }
    };

    // Duplicate guard: never ingest the same external id twice.
    if history::is_duplicate(conn, top.candidate.external_id as i64)? {
        info!(
            path = %path_str,
            external_id = top.candidate.external_id,
            "duplicate content, rejecting"
        );
        return Ok(RoutingDecision::Reject(RejectReason::Duplicate {
            external_id: top.candidate.external_id,
        }));
    }

    if policy.auto_ingest && top.confidence >= policy.auto_threshold {
        info!(
            path = %path_str,
            confidence = top.confidence,
            external_id = top.candidate.external_id,
            "auto-ingesting"
        );
        return Ok(RoutingDecision::AutoIngest(top.clone()));
    }

    // Everything else is queued -- even a single low-confidence candidate,
    // so a human always has the option to correct it.
    let reason = queue_reason(match_set, policy);
    info!(
        path = %path_str,
        confidence = top.confidence,
        reason = %reason,
        "queueing for review"
    );
    queue::create_item(
        conn,
        &path_str,
        &match_set.guess,
        &match_set.ranked,
        Some(&reason),
    )?;

    Ok(RoutingDecision::Queue(match_set.ranked.clone()))
}

/// Human-readable diagnosis of why a match set landed in the queue, specific
/// enough that the reviewer knows what to fix.
fn queue_reason(match_set: &MatchSet, policy: &RoutingPolicy) -> String {
    let top = match match_set.top() {
        Some(top) => top,
        None => return "no candidates".to_string(),
    };

    let mut reasons: Vec<String> = Vec::new();

    match top.breakdown.year_signal {
        YearSignal::NoGuessYear => {
            reasons.push("no year in the filename; add a year to improve confidence".to_string());
        }
        YearSignal::Mismatch | YearSignal::Near => {
            if let (Some(g), Some(c)) = (match_set.guess.year, top.candidate.year) {
                reasons.push(format!("filename year {g} does not match candidate year {c}"));
            }
        }
        _ => {}
    }

    if top.breakdown.title < 0.8 {
        reasons.push(format!(
            "title similarity is low ({:.0}%)",
            top.breakdown.title * 100.0
        ));
    }
    if top.breakdown.kind == 0.0 {
        reasons.push("media type is unclear or mismatched".to_string());
    }

    if reasons.is_empty() {
        if !policy.auto_ingest && top.confidence >= policy.auto_threshold {
            reasons.push("auto-ingest is disabled".to_string());
        } else {
            reasons.push(format!(
                "confidence {:.2} is below the auto threshold {:.2}",
                top.confidence, policy.auto_threshold
            ));
        }
    }

    reasons.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::HistoryStatus;
    use crate::db::pool::init_memory_pool;
    use crate::db::queries::history::NewRecord;
    use crate::guess::{guess_filename, MediaKind};
    use crate::matcher::{rank, Weights};
    use crate::metadata::Candidate;
    use std::path::PathBuf;

    fn matrix_set() -> MatchSet {
        let guess = guess_filename("The.Matrix.1999.1080p.BluRay.mkv");
        let candidates = vec![Candidate {
            external_id: 603,
            title: "The Matrix".to_string(),
            year: Some(1999),
            media_kind: MediaKind::Movie,
            vote_count: 26000,
            vote_average: 8.2,
        }];
        let ranked = rank(&guess, &candidates, &Weights::default());
        MatchSet { guess, ranked }
    }

    fn thing_set() -> MatchSet {
        let guess = guess_filename("The.Thing.mkv");
        let candidates = vec![
            Candidate {
                external_id: 1091,
                title: "The Thing".to_string(),
                year: Some(1982),
                media_kind: MediaKind::Movie,
                vote_count: 8000,
                vote_average: 8.1,
            },
            Candidate {
                external_id: 60935,
                title: "The Thing".to_string(),
                year: Some(2011),
                media_kind: MediaKind::Movie,
                vote_count: 3000,
                vote_average: 6.1,
            },
        ];
        let ranked = rank(&guess, &candidates, &Weights::default());
        MatchSet { guess, ranked }
    }

    const POLICY: RoutingPolicy = RoutingPolicy {
        auto_ingest: true,
        auto_threshold: 0.85,
    };

    #[test]
    fn empty_candidates_reject_no_match() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let set = MatchSet {
            guess: guess_filename("garbage.mkv"),
            ranked: vec![],
        };

        let decision = route(&conn, &PathBuf::from("/ingest/garbage.mkv"), &set, &POLICY).unwrap();
        assert_eq!(decision, RoutingDecision::Reject(RejectReason::NoMatch));
    }

    #[test]
    fn high_confidence_auto_ingests() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let set = matrix_set();

        let decision = route(&conn, &PathBuf::from("/ingest/m.mkv"), &set, &POLICY).unwrap();
        match decision {
            RoutingDecision::AutoIngest(m) => {
                assert_eq!(m.candidate.external_id, 603);
                assert!(m.confidence >= 0.85);
            }
            other => panic!("expected AutoIngest, got {other:?}"),
        }
        // Auto-ingest routing itself writes nothing; execution does.
        assert_eq!(queue::count_pending(&conn).unwrap(), 0);
    }

    #[test]
    fn auto_ingest_disabled_queues_with_reason() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let set = matrix_set();
        let policy = RoutingPolicy {
            auto_ingest: false,
            auto_threshold: 0.85,
        };

        let decision = route(&conn, &PathBuf::from("/ingest/m.mkv"), &set, &policy).unwrap();
        assert!(matches!(decision, RoutingDecision::Queue(_)));

        let item = queue::get_pending_by_path(&conn, "/ingest/m.mkv")
            .unwrap()
            .unwrap();
        assert!(item.reason.unwrap().contains("auto-ingest is disabled"));
    }

    #[test]
    fn low_confidence_queues_all_candidates_ordered() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let set = thing_set();

        let decision = route(&conn, &PathBuf::from("/ingest/t.mkv"), &set, &POLICY).unwrap();
        match decision {
            RoutingDecision::Queue(candidates) => {
                assert_eq!(candidates.len(), 2);
                assert!(candidates[0].confidence >= candidates[1].confidence);
            }
            other => panic!("expected Queue, got {other:?}"),
        }

        let item = queue::get_pending_by_path(&conn, "/ingest/t.mkv")
            .unwrap()
            .unwrap();
        assert!(item
            .reason
            .unwrap()
            .contains("no year in the filename"));
    }

    #[test]
    fn routing_is_idempotent() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let set = thing_set();
        let path = PathBuf::from("/ingest/t.mkv");

        let first = route(&conn, &path, &set, &POLICY).unwrap();
        let second = route(&conn, &path, &set, &POLICY).unwrap();

        assert_eq!(first, second);
        assert_eq!(queue::count_pending(&conn).unwrap(), 1);
    }

    #[test]
    fn duplicate_guard_rejects_reingestion() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        crate::db::queries::history::add_record(
            &conn,
            NewRecord {
                source_path: "/ingest/old.mkv",
                destination_path: Some("/media/Movies/m.mkv"),
                external_id: 603,
                media_kind: "movie",
                confidence: 0.95,
                status: HistoryStatus::Success,
                error: None,
                duration_ms: 100,
                size_bytes: 1,
            },
        )
        .unwrap();

        let decision =
            route(&conn, &PathBuf::from("/ingest/new.mkv"), &matrix_set(), &POLICY).unwrap();
        assert_eq!(
            decision,
            RoutingDecision::Reject(RejectReason::Duplicate { external_id: 603 })
        );
        assert_eq!(queue::count_pending(&conn).unwrap(), 0);
    }
}
