//! TMDB (The Movie Database) metadata provider.
//!
//! Implements [`MetadataProvider`] by querying the TMDB v3 REST API.
//!
//! Features:
//! - Token-bucket rate limiting at 4 requests / second via [`governor`].
//! - Automatic retry on HTTP 429 with `Retry-After` header support (max 3 retries).
//! - 30-second request timeout.
//! - Wire payloads validated and converted to [`Candidate`] at this boundary.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::guess::MediaKind;
use crate::metadata::provider::{Candidate, MetadataProvider, ProviderError};

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;

// ---------------------------------------------------------------------------
// TMDB API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieSearchResult {
    id: u64,
    title: Option<String>,
    release_date: Option<String>,
    #[serde(default)]
    vote_count: u64,
    #[serde(default)]
    vote_average: f64,
}

#[derive(Debug, Deserialize)]
struct TmdbTvSearchResult {
    id: u64,
    name: Option<String>,
    first_air_date: Option<String>,
    #[serde(default)]
    vote_count: u64,
    #[serde(default)]
    vote_average: f64,
}

#[derive(Debug, Deserialize)]
struct TmdbEpisodeDetail {
    name: Option<String>,
}

/// Extract the year from an ISO date string like `1999-03-31`.
fn date_year(date: Option<&str>) -> Option<i32> {
    let date = date?;
    if date.len() < 4 {
        return None;
    }
    date[..4].parse().ok()
}

impl TmdbMovieSearchResult {
    fn into_candidate(self) -> Option<Candidate> {
        Some(Candidate {
            external_id: self.id,
            title: self.title?,
            year: date_year(self.release_date.as_deref()),
            media_kind: MediaKind::Movie,
            vote_count: self.vote_count,
            vote_average: self.vote_average,
        })
    }
}

impl TmdbTvSearchResult {
    fn into_candidate(self) -> Option<Candidate> {
        Some(Candidate {
            external_id: self.id,
            title: self.name?,
            year: date_year(self.first_air_date.as_deref()),
            media_kind: MediaKind::Tv,
            vote_count: self.vote_count,
            vote_average: self.vote_average,
        })
    }
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// TMDB metadata provider.
///
/// Wraps the TMDB v3 REST API with built-in rate limiting and retry logic.
pub struct TmdbProvider {
    client: reqwest::Client,
    api_key: String,
    language: String,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl TmdbProvider {
    /// Create a new TMDB provider with the given API key and language.
    ///
    /// The `language` parameter is an ISO-639-1 tag such as `"en-US"`.
    /// Rate limiting is configured at 4 requests per second.
    pub fn new(api_key: String, language: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        let quota = Quota::per_second(NonZeroU32::new(4).expect("nonzero quota"));
        let rate_limiter = RateLimiter::direct(quota);

        Self {
            client,
            api_key,
            language,
            rate_limiter,
        }
    }

    /// Execute a GET request with rate limiting and 429-retry logic.
    async fn get(&self, url: &str) -> Result<reqwest::Response, ProviderError> {
        let mut retries = 0u32;
        loop {
            self.rate_limiter.until_ready().await;

            let resp = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

            if resp.status() == StatusCode::TOO_MANY_REQUESTS {
                if retries >= MAX_RETRIES {
                    return Err(ProviderError::RateLimited);
                }
                retries += 1;
                let wait = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1);
                warn!(retry = retries, wait_secs = wait, "TMDB returned 429, backing off");
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            return resp
                .error_for_status()
                .map_err(|e| ProviderError::Unavailable(e.to_string()));
        }
    }

    /// Build a full API URL with the API key and language query parameters.
    fn url(&self, path: &str, extra_params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{TMDB_BASE_URL}{path}?api_key={}&language={}",
            self.api_key, self.language
        );
        for (key, value) in extra_params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoded(value));
        }
        url
    }
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn search(
        &self,
        title: &str,
        year: Option<i32>,
        kind: MediaKind,
    ) -> Result<Vec<Candidate>, ProviderError> {
        let year_str = year.map(|y| y.to_string());

        let candidates: Vec<Candidate> = match kind {
            MediaKind::Movie => {
                let mut params = vec![("query", title)];
                if let Some(ref y) = year_str {
                    params.push(("year", y.as_str()));
                }
                let url = self.url("/search/movie", &params);
                let resp: TmdbSearchResponse<TmdbMovieSearchResult> = self
                    .get(&url)
                    .await?
                    .json()
                    .await
                    .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
                resp.results
                    .into_iter()
                    .filter_map(TmdbMovieSearchResult::into_candidate)
                    .collect()
            }
            MediaKind::Tv => {
                let mut params = vec![("query", title)];
                if let Some(ref y) = year_str {
                    params.push(("first_air_date_year", y.as_str()));
                }
                let url = self.url("/search/tv", &params);
                let resp: TmdbSearchResponse<TmdbTvSearchResult> = self
                    .get(&url)
                    .await?
                    .json()
                    .await
                    .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
                resp.results
                    .into_iter()
                    .filter_map(TmdbTvSearchResult::into_candidate)
                    .collect()
            }
        };

        debug!(title, ?year, %kind, count = candidates.len(), "TMDB search complete");
        Ok(candidates)
    }

    async fn episode_title(
        &self,
        external_id: u64,
        season: u32,
        episode: u32,
    ) -> Result<Option<String>, ProviderError> {
        let path = format!("/tv/{external_id}/season/{season}/episode/{episode}");
        let url = self.url(&path, &[]);

        let resp = match self.get(&url).await {
            Ok(resp) => resp,
            // An unknown episode is an expected miss, not an outage.
            Err(ProviderError::Unavailable(msg)) if msg.contains("404") => return Ok(None),
            Err(e) => return Err(e),
        };

        let detail: TmdbEpisodeDetail = resp
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        Ok(detail.name)
    }
}

/// Minimal percent-encoding for query parameter values.
fn urlencoded(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push_str("%20"),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}
