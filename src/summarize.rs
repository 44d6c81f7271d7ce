//! Per-commit summarization.
//!
//! One commit in, one [`CommitSummary`] out — and never an error. Diff
//! fetch failures, empty diffs, AI failures, and rate-limit denials all
//! settle as [`CommitSummary::Unavailable`] with a reason, so one bad
//! commit can never abort the rest of an ingestion batch.

use tracing::{debug, warn};

use crate::ai::AiClient;
use crate::github::RepoHost;
use crate::models::CommitSummary;
use crate::rate_limit::RateLimiter;

/// Collaborators and budgets shared by every summarization in a batch.
pub struct SummarizeContext<'a> {
    pub host: &'a dyn RepoHost,
    pub ai: &'a dyn AiClient,
    pub limiter: &'a RateLimiter,
    /// Per-window request ceiling for the `summarize` endpoint.
    pub request_limit: u64,
    /// Diffs longer than this are truncated before the AI call.
    pub max_diff_chars: usize,
}

/// Summarize one commit's diff. Infallible by contract: every failure mode
/// is folded into [`CommitSummary::Unavailable`].
pub async fn summarize_commit(
    ctx: &SummarizeContext<'_>,
    actor: &str,
    repo_url: &str,
    commit_hash: &str,
) -> CommitSummary {
    match ctx.limiter.check(actor, "summarize", ctx.request_limit).await {
        Ok(decision) if !decision.allowed => {
            warn!(
                commit = commit_hash,
                reset_at = decision.reset_at,
                "summarize rate limited"
            );
            return CommitSummary::Unavailable(format!(
                "rate limited (window resets at {})",
                decision.reset_at
            ));
        }
        Ok(_) => {}
        Err(e) => {
            warn!(commit = commit_hash, error = %e, "rate limiter check failed");
            return CommitSummary::Unavailable(format!("rate limiter error: {}", e));
        }
    }

    let diff = match ctx.host.fetch_diff(repo_url, commit_hash).await {
        Ok(diff) => diff,
        Err(e) => {
            warn!(commit = commit_hash, error = %e, "diff fetch failed");
            return CommitSummary::Unavailable(format!("diff fetch failed: {}", e));
        }
    };

    if diff.trim().is_empty() {
        debug!(commit = commit_hash, "empty diff, nothing to summarize");
        return CommitSummary::Unavailable("empty diff".to_string());
    }

    let truncated = truncate_utf8(&diff, ctx.max_diff_chars);

    match ctx.ai.summarize(truncated).await {
        Ok(summary) => CommitSummary::Summarized(summary),
        Err(e) => {
            warn!(commit = commit_hash, error = %e, "AI summarization failed");
            CommitSummary::Unavailable(format!("summarization failed: {}", e))
        }
    }
}

/// Truncate to at most `max` bytes, backing off to the nearest UTF-8
/// character boundary.
pub fn truncate_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
