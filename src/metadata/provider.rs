//! Trait definition and types for metadata providers.
//!
//! This module defines the [`MetadataProvider`] trait that metadata backends
//! must implement, along with the strict [`Candidate`] shape consumed by the
//! scorer and router. Provider-specific wire formats are converted into
//! `Candidate` at this boundary and never leak further in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::guess::MediaKind;

/// A single result returned from a metadata search query.
///
/// Immutable; multiple candidates may tie for best match and are
/// disambiguated by the ranker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Provider identifier for this item (TMDB numeric ID).
    pub external_id: u64,
    /// Display title of the item.
    pub title: String,
    /// Release or premiere year, if known.
    pub year: Option<i32>,
    /// Movie / TV classification of the result.
    pub media_kind: MediaKind,
    /// Number of community votes; saturates the popularity transform.
    pub vote_count: u64,
    /// Community vote average, typically 0.0 - 10.0.
    pub vote_average: f64,
}

/// Failures a provider may surface to the core.
///
/// Both variants are transient: callers treat them as "no candidates this
/// attempt" rather than fatal errors.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider could not be reached or returned a server error.
    #[error("metadata provider unavailable: {0}")]
    Unavailable(String),

    /// The provider refused the request due to rate limiting, even after
    /// the client's own backoff.
    #[error("metadata provider rate limited")]
    RateLimited,
}

/// Async trait implemented by metadata backends.
///
/// Providers are expected to be wrapped in an `Arc` and shared across tasks.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Short, lowercase identifier for this provider (e.g. `"tmdb"`).
    fn name(&self) -> &'static str;

    /// Returns `true` when the provider has been configured with valid
    /// credentials and is ready to serve requests.
    fn is_available(&self) -> bool;

    /// Search for items matching `title`, optionally constrained by `year`.
    ///
    /// Results are returned in provider relevance order; ranking by
    /// confidence is the caller's job.
    async fn search(
        &self,
        title: &str,
        year: Option<i32>,
        kind: MediaKind,
    ) -> Result<Vec<Candidate>, ProviderError>;

    /// Fetch the display title of one episode, if the provider knows it.
    ///
    /// Best-effort: `Ok(None)` when the episode is unknown.
    async fn episode_title(
        &self,
        external_id: u64,
        season: u32,
        episode: u32,
    ) -> Result<Option<String>, ProviderError>;
}
