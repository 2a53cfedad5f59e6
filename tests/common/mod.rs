//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] (in-memory store + temp ingest/library dirs +
//! default config) and [`StubProvider`], a canned metadata backend so tests
//! never touch the network.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use reelsort::config::Config;
use reelsort::db::pool::{get_conn, init_memory_pool, DbPool, PooledConnection};
use reelsort::guess::MediaKind;
use reelsort::ingest::IngestExecutor;
use reelsort::matcher::MediaMatcher;
use reelsort::metadata::{Candidate, MetadataProvider, ProviderError};
use reelsort::planner::PathPlanner;

/// Metadata provider returning a canned candidate list.
pub struct StubProvider {
    pub candidates: Vec<Candidate>,
    pub fail: bool,
}

impl StubProvider {
    pub fn with_candidates(candidates: Vec<Candidate>) -> Arc<Self> {
        Arc::new(Self {
            candidates,
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            candidates: Vec::new(),
            fail: true,
        })
    }
}

#[async_trait]
impl MetadataProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn search(
        &self,
        _title: &str,
        _year: Option<i32>,
        _kind: MediaKind,
    ) -> Result<Vec<Candidate>, ProviderError> {
        if self.fail {
            return Err(ProviderError::Unavailable("stub outage".to_string()));
        }
        Ok(self.candidates.clone())
    }

    async fn episode_title(
        &self,
        _external_id: u64,
        _season: u32,
        _episode: u32,
    ) -> Result<Option<String>, ProviderError> {
        Ok(None)
    }
}

/// In-memory store plus temp ingest/library directories.
pub struct TestHarness {
    pub pool: DbPool,
    pub config: Config,
    temp: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("failed to create temp dir");
        let ingest_dir = temp.path().join("ingest");
        let library_root = temp.path().join("library");
        std::fs::create_dir_all(&ingest_dir).unwrap();
        std::fs::create_dir_all(&library_root).unwrap();

        let mut config = Config::default();
        config.watch.ingest_dir = ingest_dir;
        config.library.root = library_root;
        config.matching.auto_ingest = true;

        let pool = init_memory_pool().expect("failed to create in-memory pool");

        Self { pool, config, temp }
    }

    pub fn conn(&self) -> PooledConnection {
        get_conn(&self.pool).expect("failed to get connection")
    }

    pub fn ingest_dir(&self) -> PathBuf {
        self.config.watch.ingest_dir.clone()
    }

    pub fn library_root(&self) -> PathBuf {
        self.config.library.root.clone()
    }

    /// Write a fake media file into the ingest directory.
    pub fn write_source(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.ingest_dir().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    pub fn matcher(&self, provider: Arc<dyn MetadataProvider>) -> Arc<MediaMatcher> {
        Arc::new(MediaMatcher::new(provider, Duration::from_secs(3600)).unwrap())
    }

    pub fn executor(&self, provider: Arc<dyn MetadataProvider>) -> Arc<IngestExecutor> {
        Arc::new(IngestExecutor::new(
            self.pool.clone(),
            PathPlanner::new(self.library_root()),
            provider,
        ))
    }

    /// Keep the temp dir alive for the harness lifetime.
    pub fn temp_path(&self) -> &std::path::Path {
        self.temp.path()
    }
}

/// The Matrix (1999): the canonical high-confidence candidate.
pub fn matrix_candidate() -> Candidate {
    Candidate {
        external_id: 603,
        title: "The Matrix".to_string(),
        year: Some(1999),
        media_kind: MediaKind::Movie,
        vote_count: 26000,
        vote_average: 8.2,
    }
}

/// The Thing (1982) and The Thing (2011): equally plausible without a year.
pub fn thing_candidates() -> Vec<Candidate> {
    vec![
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
    ]
}
