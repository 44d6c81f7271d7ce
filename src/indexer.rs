//! File embedding indexer.
//!
//! [`index_file`] turns one source file into a persisted
//! (project, path, summary, vector) row: summarize the content, embed the
//! SUMMARY (not the raw content — bounds AI cost and keeps similarity
//! semantics at the summary level), and upsert on (project, path) so
//! re-indexing replaces rather than appends.
//!
//! [`index_tree`] walks a local checkout with include/exclude globs
//! and feeds each indexable file through [`index_file`]. Unchanged files
//! (same content hash as the stored row) are skipped without AI calls.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::ai::AiClient;
use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::models::SourceEmbedding;
use crate::rate_limit::RateLimiter;
use crate::store::Store;
use crate::summarize::truncate_utf8;

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAction {
    Indexed,
    /// The stored row already reflects this content; no AI calls made.
    SkippedUnchanged,
}

/// Totals from an [`index_tree`] run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexOutcome {
    pub indexed: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Summarize, embed, and upsert one file.
///
/// Rate-limit denials surface as [`Error::RateLimited`]; AI failures as
/// [`Error::Upstream`]. Unlike commit summarization there is no sentinel —
/// a file either gets a real embedding row or keeps its previous one.
pub async fn index_file(
    store: &dyn Store,
    ai: &dyn AiClient,
    limiter: &RateLimiter,
    config: &IndexConfig,
    request_limit: u64,
    project_id: &str,
    path: &str,
    content: &str,
) -> Result<IndexAction> {
    let content_hash = hash_content(content);

    if let Some(existing) = store.embedding_content_hash(project_id, path).await? {
        if existing == content_hash {
            debug!(project = project_id, path, "unchanged, skipping");
            return Ok(IndexAction::SkippedUnchanged);
        }
    }

    for endpoint in ["summarize", "embed"] {
        let decision = limiter
            .check(project_id, endpoint, request_limit)
            .await
            .map_err(|e| Error::Upstream(format!("rate limiter unavailable: {}", e)))?;
        if !decision.allowed {
            return Err(Error::RateLimited {
                endpoint: endpoint.to_string(),
                reset_at: decision.reset_at,
            });
        }
    }

    let truncated = truncate_utf8(content, config.max_content_chars);
    let summary = ai
        .summarize(truncated)
        .await
        .map_err(|e| Error::Upstream(format!("summarization failed for {}: {}", path, e)))?;

    let vector = ai
        .embed(&summary)
        .await
        .map_err(|e| Error::Upstream(format!("embedding failed for {}: {}", path, e)))?;

    store
        .upsert_embedding(&SourceEmbedding {
            project_id: project_id.to_string(),
            path: path.to_string(),
            summary,
            dims: vector.len(),
            vector,
            model: ai.model_name().to_string(),
            content_hash,
            updated_at: chrono::Utc::now().timestamp(),
        })
        .await?;

    debug!(project = project_id, path, "indexed");
    Ok(IndexAction::Indexed)
}

/// Walk a local checkout and index every file matching the configured globs.
///
/// Per-file upstream failures are logged and counted, not fatal; a
/// rate-limit denial stops the walk so the caller can back off.
pub async fn index_tree(
    store: &dyn Store,
    ai: &dyn AiClient,
    limiter: &RateLimiter,
    config: &IndexConfig,
    request_limit: u64,
    project_id: &str,
    root: &Path,
) -> Result<IndexOutcome> {
    if !root.exists() {
        return Err(Error::Upstream(format!(
            "index root does not exist: {}",
            root.display()
        )));
    }

    let include_set = build_globset(&config.include_globs).map_err(Error::Storage)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
        "**/*.lock".to_string(),
        "**/package-lock.json".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes).map_err(Error::Storage)?;

    let mut outcome = IndexOutcome::default();

    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| Error::Storage(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > config.max_file_bytes {
            debug!(path = rel_str, size, "file too large, skipping");
            continue;
        }

        // Binary or non-UTF-8 files are not indexable
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => continue,
        };

        match index_file(
            store,
            ai,
            limiter,
            config,
            request_limit,
            project_id,
            &rel_str,
            &content,
        )
        .await
        {
            Ok(IndexAction::Indexed) => outcome.indexed += 1,
            Ok(IndexAction::SkippedUnchanged) => outcome.skipped += 1,
            Err(e @ Error::RateLimited { .. }) => return Err(e),
            Err(e) => {
                warn!(path = rel_str, error = %e, "indexing failed");
                outcome.failed += 1;
            }
        }
    }

    info!(
        project = project_id,
        indexed = outcome.indexed,
        skipped = outcome.skipped,
        failed = outcome.failed,
        "index walk complete"
    );

    Ok(outcome)
}

/// Hex SHA-256 of the file content, the unchanged-skip key.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
