//! Core data models used throughout repomind.
//!
//! These types represent the projects, commits, embeddings, and retrieval
//! results that flow through the ingestion and answer pipelines.

use chrono::{DateTime, Utc};

/// Sentinel summary text persisted when summarization fails for a commit.
pub const NO_SUMMARY: &str = "No summary available";

/// A tracked repository. Created once (e.g. via `rmind project add`) and
/// read-only to the pipeline afterwards.
#[derive(Debug, Clone)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub repo_url: Option<String>,
}

/// A commit as returned by the hosting API, before summarization.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub authored_at: DateTime<Utc>,
}

/// Outcome of summarizing a single commit.
///
/// Summarization failures never escalate: a failed item settles as
/// [`Unavailable`](CommitSummary::Unavailable) with a reason, and the
/// coordinator persists the sentinel text instead of aborting the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitSummary {
    Summarized(String),
    Unavailable(String),
}

impl CommitSummary {
    /// The text persisted alongside the commit row.
    pub fn text(&self) -> &str {
        match self {
            CommitSummary::Summarized(s) => s,
            CommitSummary::Unavailable(_) => NO_SUMMARY,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, CommitSummary::Summarized(_))
    }
}

/// A commit row ready for insertion: the fetched metadata plus its summary.
#[derive(Debug, Clone)]
pub struct NewCommit {
    pub info: CommitInfo,
    pub summary: String,
}

/// A persisted (project, file) embedding row.
///
/// `model` and `dims` pin the embedding-model version that produced the
/// vector; retrieval only compares vectors sharing the query's model.
#[derive(Debug, Clone)]
pub struct SourceEmbedding {
    pub project_id: String,
    pub path: String,
    pub summary: String,
    pub vector: Vec<f32>,
    pub model: String,
    pub dims: usize,
    pub content_hash: String,
    pub updated_at: i64,
}

/// A ranked retrieval result returned by `answer`.
#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub path: String,
    pub summary: String,
    pub similarity: f32,
}

/// Diagnostic snapshot of a project's index, returned by `check_indexing`.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub project_id: String,
    pub commit_count: i64,
    pub embedding_count: i64,
    /// A few recent embedding rows for operational spot checks.
    pub sample: Vec<IndexSample>,
}

/// One sample entry in [`IndexStats`].
#[derive(Debug, Clone)]
pub struct IndexSample {
    pub path: String,
    pub model: String,
    pub updated_at: i64,
}
