//! Storage abstraction for repomind.
//!
//! The [`Store`] trait defines all persistence operations the ingestion,
//! indexing, and retrieval pipelines need, enabling pluggable backends
//! (SQLite, in-memory for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes, and
//! must honor two contracts the pipelines rely on:
//!
//! - [`insert_commits`](Store::insert_commits) is atomic at the batch level
//!   and treats duplicate (project, hash) rows as benign — a concurrent run
//!   that already inserted a commit is idempotence, not an error.
//! - [`upsert_embedding`](Store::upsert_embedding) replaces on
//!   (project, path), so an embedding set tracks the current file count,
//!   not the indexing history.

pub mod memory;
pub mod sqlite;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{IndexStats, NewCommit, Project, SourceEmbedding};

#[async_trait]
pub trait Store: Send + Sync {
    /// Register a project. Fails if the id is already taken.
    async fn insert_project(&self, project: &Project) -> Result<()>;

    /// Look up a project by id.
    async fn get_project(&self, id: &str) -> Result<Option<Project>>;

    /// All commit hashes already persisted for a project.
    async fn commit_hashes(&self, project_id: &str) -> Result<HashSet<String>>;

    /// Insert a batch of commit rows in one transaction.
    ///
    /// Duplicate (project, hash) rows are silently skipped. Returns the
    /// number of rows actually inserted; on any storage error nothing is
    /// committed.
    async fn insert_commits(&self, project_id: &str, rows: &[NewCommit]) -> Result<u64>;

    /// Insert or replace the embedding row for (project, path).
    async fn upsert_embedding(&self, row: &SourceEmbedding) -> Result<()>;

    /// Content hash of the stored embedding for (project, path), if any.
    /// Used to skip AI calls when a file is unchanged since the last index.
    async fn embedding_content_hash(
        &self,
        project_id: &str,
        path: &str,
    ) -> Result<Option<String>>;

    /// All embedding rows for a project produced by the given model version.
    async fn embeddings_for_model(
        &self,
        project_id: &str,
        model: &str,
    ) -> Result<Vec<SourceEmbedding>>;

    /// Diagnostic counts and a few sample rows for a project.
    async fn index_stats(&self, project_id: &str, sample: usize) -> Result<IndexStats>;
}
