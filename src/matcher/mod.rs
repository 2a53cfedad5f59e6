//! Match confidence scoring and ranking.
//!
//! [`score`] is a pure, total function combining title similarity, year
//! proximity, provider popularity, and media-type agreement into a single
//! [0, 1] confidence, with a per-component breakdown kept alongside so a
//! reviewer can see *why* a match scored the way it did. A missing year in
//! the guess is scored neutrally but carries a distinct [`YearSignal`] so it
//! can never be confused with a wrong year.
//!
//! [`MediaMatcher`] wires the pieces together: filename guess, cache-fronted
//! provider search, and deterministic ranking.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::guess::{guess_filename, Guess, MediaKind};
use crate::metadata::{Candidate, MetadataCache, MetadataProvider};

/// Scoring weights for the four match components. Must sum to 1.0;
/// validated once at startup, not per call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub title: f64,
    pub year: f64,
    pub popularity: f64,
    pub kind: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            title: 0.40,
            year: 0.30,
            popularity: 0.15,
            kind: 0.15,
        }
    }
}

impl Weights {
    /// Validate the invariant that weights are non-negative and sum to 1.0.
    pub fn validate(&self) -> Result<()> {
        let parts = [self.title, self.year, self.popularity, self.kind];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::invalid_input("scoring weights must be non-negative"));
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(Error::invalid_input(format!(
                "scoring weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// How the guess year related to the candidate year.
///
/// `NoGuessYear` and `Mismatch` can carry the same weight, so routing
/// messaging keys off this signal rather than the numeric component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearSignal {
    Exact,
    Adjacent,
    Near,
    Mismatch,
    NoGuessYear,
    NoCandidateYear,
}

/// Per-component scores, each in [0, 1] before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub title: f64,
    pub year: f64,
    pub year_signal: YearSignal,
    pub popularity: f64,
    pub kind: f64,
}

/// A scored pairing of a guess with one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub candidate: Candidate,
    pub confidence: f64,
    pub breakdown: ScoreBreakdown,
}

/// Confidence band driving routing behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::High => write!(f, "high"),
            Tier::Medium => write!(f, "medium"),
            Tier::Low => write!(f, "low"),
        }
    }
}

/// Classify a confidence into a tier. `high_threshold` defaults to 0.85,
/// `medium_threshold` to 0.70.
pub fn tier(confidence: f64, high_threshold: f64, medium_threshold: f64) -> Tier {
    if confidence >= high_threshold {
        Tier::High
    } else if confidence >= medium_threshold {
        Tier::Medium
    } else {
        Tier::Low
    }
}

/// Normalize a title for similarity comparison: lowercase, leading article
/// removed, punctuation stripped, whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut words = cleaned.split_whitespace();
    let first = words.next().unwrap_or("");
    let rest: Vec<&str> = words.collect();

    if matches!(first, "the" | "a" | "an") && !rest.is_empty() {
        rest.join(" ")
    } else if rest.is_empty() {
        first.to_string()
    } else {
        std::iter::once(first).chain(rest).collect::<Vec<_>>().join(" ")
    }
}

fn title_component(guess_title: &str, candidate_title: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize_title(guess_title), &normalize_title(candidate_title))
}

fn year_component(guess_year: Option<i32>, candidate_year: Option<i32>) -> (f64, YearSignal) {
    match (guess_year, candidate_year) {
        (None, _) => (0.5, YearSignal::NoGuessYear),
        (Some(_), None) => (0.5, YearSignal::NoCandidateYear),
        (Some(g), Some(c)) => match (g - c).abs() {
            0 => (1.0, YearSignal::Exact),
            1 => (0.75, YearSignal::Adjacent),
            2 => (0.35, YearSignal::Near),
            _ => (0.0, YearSignal::Mismatch),
        },
    }
}

/// Monotonic, saturating popularity transform: vote count saturates at
/// 1000 votes, scaled by the vote average. Never exceeds [0, 1] regardless
/// of provider data.
fn popularity_component(vote_count: u64, vote_average: f64) -> f64 {
    let count_factor = (vote_count as f64 / 1000.0).min(1.0);
    let average_factor = if vote_average.is_finite() {
        (vote_average / 10.0).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (count_factor * average_factor).clamp(0.0, 1.0)
}

fn kind_component(guess_kind: Option<MediaKind>, candidate_kind: MediaKind) -> f64 {
    // An unknown guess type is a mismatch, not neutral.
    match guess_kind {
        Some(k) if k == candidate_kind => 1.0,
        _ => 0.0,
    }
}

/// Score one candidate against a guess. Pure and total: absent fields
/// degrade the score, they never error.
pub fn score(guess: &Guess, candidate: &Candidate, weights: &Weights) -> MatchResult {
    let title = title_component(&guess.title, &candidate.title);
    let (year, year_signal) = year_component(guess.year, candidate.year);
    let popularity = popularity_component(candidate.vote_count, candidate.vote_average);
    let kind = kind_component(guess.media_kind, candidate.media_kind);

    let confidence = (weights.title * title
        + weights.year * year
        + weights.popularity * popularity
        + weights.kind * kind)
        .clamp(0.0, 1.0);

    MatchResult {
        candidate: candidate.clone(),
        confidence,
        breakdown: ScoreBreakdown {
            title,
            year,
            year_signal,
            popularity,
            kind,
        },
    }
}

/// Score and order candidates: confidence descending, ties broken by vote
/// count descending, then external id ascending, so repeated runs produce
/// identical rankings.
pub fn rank(guess: &Guess, candidates: &[Candidate], weights: &Weights) -> Vec<MatchResult> {
    let mut results: Vec<MatchResult> =
        candidates.iter().map(|c| score(guess, c, weights)).collect();

    results.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.candidate.vote_count.cmp(&a.candidate.vote_count))
            .then_with(|| a.candidate.external_id.cmp(&b.candidate.external_id))
    });

    results
}

/// A guess together with its confidence-ranked candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSet {
    pub guess: Guess,
    pub ranked: Vec<MatchResult>,
}

impl MatchSet {
    /// Best-scoring match, if any candidate was found.
    pub fn top(&self) -> Option<&MatchResult> {
        self.ranked.first()
    }
}

/// Full identification pipeline: filename guess, cache-fronted provider
/// search, deterministic ranking.
pub struct MediaMatcher {
    provider: Arc<dyn MetadataProvider>,
    cache: MetadataCache,
    weights: Weights,
}

impl MediaMatcher {
    /// Build a matcher; validates the weight invariant once here.
    pub fn new(provider: Arc<dyn MetadataProvider>, cache_ttl: Duration) -> Result<Self> {
        let weights = Weights::default();
        weights.validate()?;
        Ok(Self {
            provider,
            cache: MetadataCache::new(cache_ttl),
            weights,
        })
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// Identify a file by name: guess, search, rank.
    ///
    /// Provider failures are treated as "no candidates this attempt" and
    /// logged; they never propagate.
    pub async fn match_file(&self, file_name: &str) -> MatchSet {
        let guess = guess_filename(file_name);
        let ranked = self.ranked_candidates(&guess).await;
        MatchSet { guess, ranked }
    }

    async fn ranked_candidates(&self, guess: &Guess) -> Vec<MatchResult> {
        if guess.title.is_empty() {
            return Vec::new();
        }

        let kind = guess.media_kind.unwrap_or(MediaKind::Movie);

        let candidates = if let Some(hit) = self.cache.get(&guess.title, guess.year, kind) {
            hit
        } else {
            match self.provider.search(&guess.title, guess.year, kind).await {
                Ok(candidates) => {
                    if !candidates.is_empty() {
                        self.cache
                            .store(&guess.title, guess.year, kind, candidates.clone());
                    }
                    candidates
                }
                Err(e) => {
                    warn!(
                        title = %guess.title,
                        error = %e,
                        "metadata search failed, no candidates this attempt"
                    );
                    Vec::new()
                }
            }
        };

        rank(guess, &candidates, &self.weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie_guess(title: &str, year: Option<i32>) -> Guess {
        Guess {
            title: title.to_string(),
            year,
            media_kind: Some(MediaKind::Movie),
            season: None,
            episode: None,
            quality_tags: Default::default(),
            source_name: format!("{title}.mkv"),
        }
    }

    fn candidate(id: u64, title: &str, year: Option<i32>, votes: u64, avg: f64) -> Candidate {
        Candidate {
            external_id: id,
            title: title.to_string(),
            year,
            media_kind: MediaKind::Movie,
            vote_count: votes,
            vote_average: avg,
        }
    }

    #[test]
    fn default_weights_sum_to_one() {
        Weights::default().validate().unwrap();
    }

    #[test]
    fn bad_weights_rejected() {
        let w = Weights {
            title: 0.5,
            year: 0.5,
            popularity: 0.5,
            kind: 0.5,
        };
        assert!(w.validate().is_err());
    }

    #[test]
    fn score_stays_in_bounds() {
        let weights = Weights::default();
        let cases = [
            candidate(1, "The Matrix", Some(1999), u64::MAX, 1000.0),
            candidate(2, "", None, 0, -5.0),
            candidate(3, "x", Some(2099), 1, f64::INFINITY),
        ];
        for c in &cases {
            let result = score(&movie_guess("The Matrix", Some(1999)), c, &weights);
            assert!(
                (0.0..=1.0).contains(&result.confidence),
                "out of bounds: {:?}",
                result
            );
        }
    }

    #[test]
    fn exact_match_scores_high_tier() {
        let weights = Weights::default();
        let guess = movie_guess("The Matrix", Some(1999));
        let c = candidate(603, "The Matrix", Some(1999), 26000, 8.2);

        let result = score(&guess, &c, &weights);
        assert!(result.confidence >= 0.85, "got {}", result.confidence);
        assert_eq!(tier(result.confidence, 0.85, 0.70), Tier::High);
        assert_eq!(result.breakdown.year_signal, YearSignal::Exact);
    }

    #[test]
    fn missing_year_distinguishable_from_wrong_year() {
        let weights = Weights::default();
        let c = candidate(603, "The Matrix", Some(1999), 26000, 8.2);

        let missing = score(&movie_guess("The Matrix", None), &c, &weights);
        let wrong = score(&movie_guess("The Matrix", Some(1950)), &c, &weights);

        assert_eq!(missing.breakdown.year_signal, YearSignal::NoGuessYear);
        assert_eq!(wrong.breakdown.year_signal, YearSignal::Mismatch);
        assert_ne!(missing.breakdown.year_signal, wrong.breakdown.year_signal);
        // Neutral beats wrong in the numeric component too.
        assert!(missing.breakdown.year > wrong.breakdown.year);
    }

    #[test]
    fn adjacent_year_gets_partial_credit() {
        let (weight, signal) = super::year_component(Some(1999), Some(2000));
        assert_eq!(weight, 0.75);
        assert_eq!(signal, YearSignal::Adjacent);

        let (weight, signal) = super::year_component(Some(1999), Some(2001));
        assert_eq!(weight, 0.35);
        assert_eq!(signal, YearSignal::Near);
    }

    #[test]
    fn unknown_guess_kind_is_mismatch() {
        let weights = Weights::default();
        let mut guess = movie_guess("The Thing", None);
        guess.media_kind = None;
        let c = candidate(1091, "The Thing", Some(1982), 8000, 8.1);

        let result = score(&guess, &c, &weights);
        assert_eq!(result.breakdown.kind, 0.0);
    }

    #[test]
    fn popularity_saturates_and_clamps() {
        assert_eq!(super::popularity_component(0, 8.0), 0.0);
        assert!((super::popularity_component(500, 10.0) - 0.5).abs() < 1e-9);
        assert_eq!(super::popularity_component(u64::MAX, 100.0), 1.0);
        assert_eq!(super::popularity_component(1000, -3.0), 0.0);
    }

    #[test]
    fn ranking_is_deterministic_on_ties() {
        let weights = Weights::default();
        let guess = movie_guess("The Thing", None);
        // Identical scores except for id; popularity tie.
        let a = candidate(2011, "The Thing", Some(2011), 5000, 6.2);
        let b = candidate(1091, "The Thing", Some(2011), 5000, 6.2);

        for _ in 0..5 {
            let ranked = rank(&guess, &[a.clone(), b.clone()], &weights);
            assert_eq!(ranked[0].candidate.external_id, 1091);
            assert_eq!(ranked[1].candidate.external_id, 2011);
        }

        // Higher popularity wins the tie before id does.
        let popular = candidate(9999, "The Thing", Some(2011), 9000, 6.2);
        let ranked = rank(&guess, &[a.clone(), popular.clone()], &weights);
        assert_eq!(ranked[0].candidate.external_id, 9999);
    }

    #[test]
    fn normalize_strips_articles_and_punctuation() {
        assert_eq!(normalize_title("The Matrix"), "matrix");
        assert_eq!(normalize_title("A Bug's Life!"), "bug s life");
        assert_eq!(normalize_title("An  Education"), "education");
        assert_eq!(normalize_title("The"), "the");
        assert_eq!(normalize_title("Se7en"), "se7en");
    }

    #[test]
    fn tier_bounds() {
        assert_eq!(tier(0.85, 0.85, 0.70), Tier::High);
        assert_eq!(tier(0.8499, 0.85, 0.70), Tier::Medium);
        assert_eq!(tier(0.70, 0.85, 0.70), Tier::Medium);
        assert_eq!(tier(0.69, 0.85, 0.70), Tier::Low);
    }
}
