//! Time-expiring cache for metadata search results.
//!
//! Keyed by (normalized title, year, media kind); a hit within the TTL
//! skips the provider round-trip entirely. Entries are dropped lazily on
//! access, so an idle cache holds stale entries but never serves them.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::guess::MediaKind;
use crate::metadata::provider::Candidate;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    title: String,
    year: Option<i32>,
    kind: MediaKind,
}

impl CacheKey {
    fn new(title: &str, year: Option<i32>, kind: MediaKind) -> Self {
        Self {
            title: title.trim().to_lowercase(),
            year,
            kind,
        }
    }
}

/// In-memory TTL cache mapping search queries to candidate sets.
pub struct MetadataCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, (Instant, Vec<Candidate>)>>,
}

impl MetadataCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a cached candidate set. Expired entries are removed and
    /// reported as a miss.
    pub fn get(&self, title: &str, year: Option<i32>, kind: MediaKind) -> Option<Vec<Candidate>> {
        let key = CacheKey::new(title, year, kind);

        {
            let entries = self.entries.read();
            match entries.get(&key) {
                Some((stored_at, candidates)) if stored_at.elapsed() < self.ttl => {
                    return Some(candidates.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: take the write lock to evict.
        self.entries.write().remove(&key);
        None
    }

    /// Store a candidate set, replacing any previous entry for the key.
    pub fn store(&self, title: &str, year: Option<i32>, kind: MediaKind, candidates: Vec<Candidate>) {
        let key = CacheKey::new(title, year, kind);
        self.entries.write().insert(key, (Instant::now(), candidates));
    }

    /// Number of live (possibly expired, not-yet-evicted) entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
