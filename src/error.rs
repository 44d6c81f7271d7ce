//! Error taxonomy for the indexing and retrieval pipeline.
//!
//! Storage-layer and collaborator internals keep `anyhow` as their error
//! currency; the pipeline surfaces a small typed taxonomy so callers can
//! distinguish "back off" from "give up":
//!
//! - [`Error::ProjectNotFound`] / [`Error::MissingRepoUrl`] — caller mistakes,
//!   never retried.
//! - [`Error::Upstream`] — an external collaborator failed: the hosting API,
//!   an AI call after retries, or the rate limiter's counter backend.
//! - [`Error::RateLimited`] — the request budget is exhausted; carries the
//!   window reset time so callers can back off.
//! - [`Error::Storage`] — persistence failure; batch-level, nothing committed.
//!
//! Duplicate-key conflicts are deliberately absent: the store treats them as
//! benign idempotence (the row was already written by a concurrent run).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("project '{0}' has no repository URL")]
    MissingRepoUrl(String),

    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("rate limited on '{endpoint}' (window resets at {reset_at})")]
    RateLimited { endpoint: String, reset_at: i64 },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
