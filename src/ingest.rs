//! Ingestion coordination.
//!
//! [`poll_commits`] runs the full flow for one project: fetch recent commit
//! history, drop the commits already persisted, summarize the remainder
//! concurrently, and bulk-insert the results.
//!
//! The fan-out is the only concurrent region. It is bounded by
//! `ingest.max_concurrency` and settles every item — an ordered `buffered`
//! stream acts as the join barrier, so results come back in fetch order and
//! a failed summarization settles as a sentinel row instead of failing the
//! batch. Persistence happens after the barrier in a single transaction;
//! dropping the returned future cancels in-flight work with nothing
//! partially inserted.

use futures::{stream, StreamExt};
use tracing::{debug, info};

use crate::ai::AiClient;
use crate::config::IngestConfig;
use crate::dedup;
use crate::error::{Error, Result};
use crate::github::RepoHost;
use crate::models::NewCommit;
use crate::rate_limit::RateLimiter;
use crate::store::Store;
use crate::summarize::{summarize_commit, SummarizeContext};

/// What one `poll_commits` invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Commits returned by the hosting API.
    pub fetched: usize,
    /// Commits not yet persisted (the summarization fan-out size).
    pub unprocessed: usize,
    /// Rows actually inserted.
    pub inserted: u64,
    /// Items whose summary settled as the sentinel.
    pub failed_summaries: usize,
}

/// Poll the hosting API for a project and ingest anything new.
///
/// Re-invocation is idempotent: with no new upstream commits the
/// deduplicator filters everything out and zero rows are inserted.
pub async fn poll_commits(
    store: &dyn Store,
    host: &dyn RepoHost,
    ai: &dyn AiClient,
    limiter: &RateLimiter,
    config: &IngestConfig,
    request_limit: u64,
    project_id: &str,
) -> Result<IngestOutcome> {
    let project = store
        .get_project(project_id)
        .await?
        .ok_or_else(|| Error::ProjectNotFound(project_id.to_string()))?;

    let repo_url = project
        .repo_url
        .ok_or_else(|| Error::MissingRepoUrl(project_id.to_string()))?;

    let fetched = host
        .list_commits(&repo_url, config.commit_count)
        .await
        .map_err(|e| Error::Upstream(e.to_string()))?;
    let fetched_count = fetched.len();

    let seen = store.commit_hashes(project_id).await?;
    let pending = dedup::unprocessed(&seen, fetched);

    if pending.is_empty() {
        debug!(project = project_id, fetched = fetched_count, "nothing new to ingest");
        return Ok(IngestOutcome {
            fetched: fetched_count,
            unprocessed: 0,
            inserted: 0,
            failed_summaries: 0,
        });
    }

    let ctx = SummarizeContext {
        host,
        ai,
        limiter,
        request_limit,
        max_diff_chars: config.max_diff_chars,
    };

    // Settle-all fan-out: bounded, ordered, and never failing on an item
    let summaries: Vec<_> = stream::iter(
        pending
            .iter()
            .map(|c| summarize_commit(&ctx, project_id, &repo_url, &c.hash)),
    )
    .buffered(config.max_concurrency)
    .collect()
    .await;

    let failed_summaries = summaries.iter().filter(|s| !s.is_available()).count();

    let rows: Vec<NewCommit> = pending
        .into_iter()
        .zip(summaries)
        .map(|(info, summary)| NewCommit {
            summary: summary.text().to_string(),
            info,
        })
        .collect();

    let inserted = store.insert_commits(project_id, &rows).await?;

    info!(
        project = project_id,
        fetched = fetched_count,
        unprocessed = rows.len(),
        inserted,
        failed_summaries,
        "ingestion complete"
    );

    Ok(IngestOutcome {
        fetched: fetched_count,
        unprocessed: rows.len(),
        inserted,
        failed_summaries,
    })
}
