//! Metadata lookup: provider trait, TMDB backend, and the TTL cache that
//! fronts them.

pub mod cache;
pub mod provider;
pub mod providers;

pub use cache::MetadataCache;
pub use provider::{Candidate, MetadataProvider, ProviderError};
