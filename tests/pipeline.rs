//! End-to-end pipeline tests against the in-memory store.
//!
//! These drive `poll_commits`, `index_file`, and `answer` through stub
//! hosting and AI clients to prove the coordinator-level behavior: idempotent
//! re-polls, sentinel rows for failed summaries, upsert-on-reindex, and the
//! unchanged-content skip.

use std::collections::HashSet;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use repomind::ai::AiClient;
use repomind::config::{IndexConfig, IngestConfig};
use repomind::error::Error;
use repomind::github::RepoHost;
use repomind::indexer::{self, IndexAction};
use repomind::ingest;
use repomind::models::{CommitInfo, Project, NO_SUMMARY};
use repomind::rate_limit::{MemoryCounterStore, RateLimiter};
use repomind::retrieve::{self, RetrievalParams};
use repomind::store::memory::InMemoryStore;
use repomind::store::Store;

// ─── Stubs ──────────────────────────────────────────────────────────

struct StubHost {
    commits: Vec<CommitInfo>,
    /// Hashes whose diff fetch fails.
    broken_diffs: HashSet<String>,
}

impl StubHost {
    fn new(commits: Vec<CommitInfo>) -> Self {
        Self {
            commits,
            broken_diffs: HashSet::new(),
        }
    }
}

#[async_trait]
impl RepoHost for StubHost {
    async fn list_commits(&self, _repo_url: &str, limit: usize) -> Result<Vec<CommitInfo>> {
        Ok(self.commits.iter().take(limit).cloned().collect())
    }

    async fn fetch_diff(&self, _repo_url: &str, commit_hash: &str) -> Result<String> {
        if self.broken_diffs.contains(commit_hash) {
            anyhow::bail!("diff unavailable for {}", commit_hash);
        }
        Ok(format!("diff --git a/f b/f\n+{}", commit_hash))
    }
}

struct FailingHost;

#[async_trait]
impl RepoHost for FailingHost {
    async fn list_commits(&self, _repo_url: &str, _limit: usize) -> Result<Vec<CommitInfo>> {
        anyhow::bail!("503 from hosting API")
    }

    async fn fetch_diff(&self, _repo_url: &str, _commit_hash: &str) -> Result<String> {
        anyhow::bail!("503 from hosting API")
    }
}

struct StubAi {
    summarize_calls: Arc<AtomicUsize>,
    embed_calls: Arc<AtomicUsize>,
}

impl StubAi {
    fn new() -> Self {
        Self {
            summarize_calls: Arc::new(AtomicUsize::new(0)),
            embed_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl AiClient for StubAi {
    fn model_name(&self) -> &str {
        "stub-embed-1"
    }

    fn dims(&self) -> usize {
        3
    }

    async fn summarize(&self, text: &str) -> Result<String> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("summary of: {}", text.lines().last().unwrap_or("")))
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![1.0, 0.0, 0.0])
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn commit(hash: &str, ts: i64) -> CommitInfo {
    CommitInfo {
        hash: hash.to_string(),
        message: format!("commit {}", hash),
        author_name: "dev".to_string(),
        author_avatar: None,
        authored_at: DateTime::<Utc>::from_timestamp(ts, 0).unwrap(),
    }
}

async fn project_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store
        .insert_project(&Project {
            id: "p1".to_string(),
            name: "Project One".to_string(),
            repo_url: Some("https://github.com/org/p1".to_string()),
        })
        .await
        .unwrap();
    store
}

fn ingest_config() -> IngestConfig {
    IngestConfig {
        commit_count: 10,
        max_concurrency: 3,
        max_diff_chars: 10_000,
    }
}

// ─── Polling ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_poll_inserts_new_commits_then_is_idempotent() {
    let store = project_store().await;
    let host = StubHost::new(vec![commit("aaa", 30), commit("bbb", 20), commit("ccc", 10)]);
    let ai = StubAi::new();
    let limiter = RateLimiter::unbounded();

    let first = ingest::poll_commits(&store, &host, &ai, &limiter, &ingest_config(), 100, "p1")
        .await
        .unwrap();
    assert_eq!(first.fetched, 3);
    assert_eq!(first.unprocessed, 3);
    assert_eq!(first.inserted, 3);
    assert_eq!(first.failed_summaries, 0);
    assert_eq!(store.commit_count("p1"), 3);

    // Nothing new upstream: the second poll settles without inserting.
    let second = ingest::poll_commits(&store, &host, &ai, &limiter, &ingest_config(), 100, "p1")
        .await
        .unwrap();
    assert_eq!(second.fetched, 3);
    assert_eq!(second.unprocessed, 0);
    assert_eq!(second.inserted, 0);
    assert_eq!(store.commit_count("p1"), 3);
}

#[tokio::test]
async fn test_poll_only_new_commits_are_summarized() {
    let store = project_store().await;
    let ai = StubAi::new();
    let limiter = RateLimiter::unbounded();

    let host = StubHost::new(vec![commit("aaa", 20), commit("bbb", 10)]);
    ingest::poll_commits(&store, &host, &ai, &limiter, &ingest_config(), 100, "p1")
        .await
        .unwrap();
    assert_eq!(ai.summarize_calls.load(Ordering::SeqCst), 2);

    // One new commit appears; only it should cost an AI call.
    let host = StubHost::new(vec![commit("ddd", 30), commit("aaa", 20), commit("bbb", 10)]);
    let outcome = ingest::poll_commits(&store, &host, &ai, &limiter, &ingest_config(), 100, "p1")
        .await
        .unwrap();
    assert_eq!(outcome.unprocessed, 1);
    assert_eq!(outcome.inserted, 1);
    assert_eq!(ai.summarize_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_failed_summary_settles_as_sentinel_row() {
    let store = project_store().await;
    let mut host = StubHost::new(vec![commit("good", 20), commit("bad", 10)]);
    host.broken_diffs.insert("bad".to_string());
    let ai = StubAi::new();
    let limiter = RateLimiter::unbounded();

    let outcome = ingest::poll_commits(&store, &host, &ai, &limiter, &ingest_config(), 100, "p1")
        .await
        .unwrap();

    // The failure never fails the batch: both rows persist.
    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.failed_summaries, 1);

    let rows = store.commit_summaries("p1");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0, "good");
    assert!(rows[0].1.starts_with("summary of:"));
    assert_eq!(rows[1].0, "bad");
    assert_eq!(rows[1].1, NO_SUMMARY);
}

#[tokio::test]
async fn test_poll_preserves_fetch_order() {
    let store = project_store().await;
    let host = StubHost::new(vec![
        commit("c1", 50),
        commit("c2", 40),
        commit("c3", 30),
        commit("c4", 20),
        commit("c5", 10),
    ]);
    let ai = StubAi::new();
    let limiter = RateLimiter::unbounded();

    ingest::poll_commits(&store, &host, &ai, &limiter, &ingest_config(), 100, "p1")
        .await
        .unwrap();

    let hashes: Vec<String> = store
        .commit_summaries("p1")
        .into_iter()
        .map(|(h, _)| h)
        .collect();
    assert_eq!(hashes, vec!["c1", "c2", "c3", "c4", "c5"]);
}

#[tokio::test]
async fn test_poll_unknown_project_errors() {
    let store = InMemoryStore::new();
    let host = StubHost::new(vec![]);
    let ai = StubAi::new();
    let limiter = RateLimiter::unbounded();

    let err = ingest::poll_commits(&store, &host, &ai, &limiter, &ingest_config(), 100, "ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProjectNotFound(_)));
}

#[tokio::test]
async fn test_poll_without_repo_url_errors() {
    let store = InMemoryStore::new();
    store
        .insert_project(&Project {
            id: "local".to_string(),
            name: "local".to_string(),
            repo_url: None,
        })
        .await
        .unwrap();
    let host = StubHost::new(vec![]);
    let ai = StubAi::new();
    let limiter = RateLimiter::unbounded();

    let err = ingest::poll_commits(&store, &host, &ai, &limiter, &ingest_config(), 100, "local")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingRepoUrl(_)));
}

#[tokio::test]
async fn test_poll_host_failure_is_upstream_error() {
    let store = project_store().await;
    let ai = StubAi::new();
    let limiter = RateLimiter::unbounded();

    let err = ingest::poll_commits(
        &store,
        &FailingHost,
        &ai,
        &limiter,
        &ingest_config(),
        100,
        "p1",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Upstream(_)));
    assert_eq!(store.commit_count("p1"), 0);
}

// ─── Indexing ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_reindex_replaces_the_single_row() {
    let store = project_store().await;
    let ai = StubAi::new();
    let limiter = RateLimiter::unbounded();
    let config = IndexConfig::default();

    let action = indexer::index_file(
        &store, &ai, &limiter, &config, 100, "p1", "src/auth.rs", "fn v1() {}",
    )
    .await
    .unwrap();
    assert_eq!(action, IndexAction::Indexed);

    let action = indexer::index_file(
        &store, &ai, &limiter, &config, 100, "p1", "src/auth.rs", "fn v2() {}",
    )
    .await
    .unwrap();
    assert_eq!(action, IndexAction::Indexed);

    let rows = store.all_embeddings("p1");
    assert_eq!(rows.len(), 1);
    assert!(rows[0].summary.contains("v2"));
    assert_eq!(rows[0].content_hash, indexer::hash_content("fn v2() {}"));
}

#[tokio::test]
async fn test_unchanged_content_skips_ai_calls() {
    let store = project_store().await;
    let ai = StubAi::new();
    let limiter = RateLimiter::unbounded();
    let config = IndexConfig::default();

    indexer::index_file(
        &store, &ai, &limiter, &config, 100, "p1", "README.md", "hello",
    )
    .await
    .unwrap();
    let calls_after_first = ai.summarize_calls.load(Ordering::SeqCst);

    let action = indexer::index_file(
        &store, &ai, &limiter, &config, 100, "p1", "README.md", "hello",
    )
    .await
    .unwrap();
    assert_eq!(action, IndexAction::SkippedUnchanged);
    assert_eq!(ai.summarize_calls.load(Ordering::SeqCst), calls_after_first);
    assert_eq!(store.all_embeddings("p1").len(), 1);
}

#[tokio::test]
async fn test_index_file_denied_by_limiter() {
    let store = project_store().await;
    let ai = StubAi::new();
    let limiter = RateLimiter::budgeted(
        Arc::new(MemoryCounterStore::new()),
        std::time::Duration::from_secs(60),
    );
    let config = IndexConfig::default();

    // Budget of zero requests denies immediately.
    let err = indexer::index_file(&store, &ai, &limiter, &config, 0, "p1", "a.rs", "x")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RateLimited { .. }));
    assert_eq!(ai.summarize_calls.load(Ordering::SeqCst), 0);
    assert!(store.all_embeddings("p1").is_empty());
}

#[tokio::test]
async fn test_index_tree_filters_then_skips_unchanged_on_rerun() {
    let store = project_store().await;
    let ai = StubAi::new();
    let limiter = RateLimiter::unbounded();

    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
    fs::write(root.join("src/lib.rs"), "pub fn a() {}").unwrap();
    fs::write(root.join("src/big.rs"), "x".repeat(200)).unwrap();
    fs::write(root.join("src/raw.bin"), [0xFFu8, 0xFE, 0x00, 0x80]).unwrap();
    fs::write(root.join("node_modules/pkg/index.js"), "module.exports = 1").unwrap();

    let config = IndexConfig {
        max_file_bytes: 100,
        ..IndexConfig::default()
    };

    let outcome = indexer::index_tree(&store, &ai, &limiter, &config, 100, "p1", root)
        .await
        .unwrap();

    // Only src/lib.rs survives: node_modules is excluded by default,
    // big.rs is over the size cap, raw.bin is not valid UTF-8.
    assert_eq!(outcome.indexed, 1);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(outcome.failed, 0);
    let rows = store.all_embeddings("p1");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].path, "src/lib.rs");

    // A second walk over unchanged content makes no AI calls.
    let calls = ai.summarize_calls.load(Ordering::SeqCst);
    let rerun = indexer::index_tree(&store, &ai, &limiter, &config, 100, "p1", root)
        .await
        .unwrap();
    assert_eq!(rerun.indexed, 0);
    assert_eq!(rerun.skipped, 1);
    assert_eq!(ai.summarize_calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_index_tree_aborts_on_rate_limit_denial() {
    let store = project_store().await;
    let ai = StubAi::new();
    let limiter = RateLimiter::budgeted(
        Arc::new(MemoryCounterStore::new()),
        Duration::from_secs(60),
    );

    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path();
    fs::write(root.join("a.rs"), "fn a() {}").unwrap();
    fs::write(root.join("b.rs"), "fn b() {}").unwrap();

    // Each file costs two budget checks; a budget of three lets the first
    // file through and denies the second, which aborts the walk.
    let err = indexer::index_tree(
        &store,
        &ai,
        &limiter,
        &IndexConfig::default(),
        3,
        "p1",
        root,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::RateLimited { .. }));
    assert_eq!(store.all_embeddings("p1").len(), 1);
}

#[tokio::test]
async fn test_index_tree_missing_root_errors() {
    let store = project_store().await;
    let ai = StubAi::new();
    let limiter = RateLimiter::unbounded();

    let err = indexer::index_tree(
        &store,
        &ai,
        &limiter,
        &IndexConfig::default(),
        100,
        "p1",
        std::path::Path::new("/nonexistent/checkout"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Upstream(_)));
    assert!(store.all_embeddings("p1").is_empty());
}

// ─── Poll then ask ──────────────────────────────────────────────────

#[tokio::test]
async fn test_indexed_files_are_retrievable() {
    let store = project_store().await;
    let ai = StubAi::new();
    let limiter = RateLimiter::unbounded();
    let config = IndexConfig::default();

    indexer::index_file(
        &store, &ai, &limiter, &config, 100, "p1", "src/login.rs", "fn login() {}",
    )
    .await
    .unwrap();

    let hits = retrieve::answer(
        &store,
        &ai,
        &limiter,
        &RetrievalParams::default(),
        100,
        "p1",
        "where is login handled?",
    )
    .await
    .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "src/login.rs");
    // Stub embeds everything to the same unit vector.
    assert!((hits[0].similarity - 1.0).abs() < 1e-5);
}
