//! Question answering over a project's embedding index.
//!
//! [`answer`] embeds the question with the same model version that built
//! the index, scores every stored vector for the project by cosine
//! similarity, and returns the top K. Rows written by a different embedding
//! model (or with a mismatched dimensionality) are excluded from scoring —
//! comparing vectors across model versions silently degrades ranking, so
//! the index must be rebuilt after a model upgrade.
//!
//! There is no default similarity floor: a sparse index may return weakly
//! relevant results, which is a tunable, not a bug. Callers supply K and an
//! optional floor via [`RetrievalParams`].

use tracing::debug;

use crate::ai::AiClient;
use crate::error::{Error, Result};
use crate::models::RetrievalHit;
use crate::rate_limit::RateLimiter;
use crate::store::Store;
use crate::vectors::cosine_similarity;

/// Caller-supplied retrieval tuning.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    /// Maximum results to return.
    pub top_k: usize,
    /// Drop hits scoring below this, if set.
    pub min_similarity: Option<f32>,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_similarity: None,
        }
    }
}

/// Answer a natural-language question with the most relevant indexed files.
///
/// Fails as a whole on embedding or storage errors — there is no partial
/// or degraded answer.
pub async fn answer(
    store: &dyn Store,
    ai: &dyn AiClient,
    limiter: &RateLimiter,
    params: &RetrievalParams,
    request_limit: u64,
    project_id: &str,
    question: &str,
) -> Result<Vec<RetrievalHit>> {
    store
        .get_project(project_id)
        .await?
        .ok_or_else(|| Error::ProjectNotFound(project_id.to_string()))?;

    let decision = limiter
        .check(project_id, "embed", request_limit)
        .await
        .map_err(|e| Error::Upstream(format!("rate limiter unavailable: {}", e)))?;
    if !decision.allowed {
        return Err(Error::RateLimited {
            endpoint: "embed".to_string(),
            reset_at: decision.reset_at,
        });
    }

    let query_vec = ai
        .embed(question)
        .await
        .map_err(|e| Error::Upstream(format!("question embedding failed: {}", e)))?;

    let rows = store
        .embeddings_for_model(project_id, ai.model_name())
        .await?;
    let candidates = rows.len();

    let mut hits: Vec<RetrievalHit> = rows
        .into_iter()
        .filter(|row| row.vector.len() == query_vec.len())
        .map(|row| RetrievalHit {
            similarity: cosine_similarity(&query_vec, &row.vector),
            path: row.path,
            summary: row.summary,
        })
        .collect();

    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if let Some(floor) = params.min_similarity {
        hits.retain(|h| h.similarity >= floor);
    }
    hits.truncate(params.top_k);

    debug!(
        project = project_id,
        candidates,
        returned = hits.len(),
        "retrieval complete"
    );

    Ok(hits)
}
