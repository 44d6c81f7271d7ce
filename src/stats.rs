//! Indexing diagnostics.
//!
//! `rmind status` answers the operational question "did indexing actually
//! happen for this project?": commit and embedding counts plus a few recent
//! embedding rows as a spot check.

use crate::error::{Error, Result};
use crate::models::IndexStats;
use crate::store::Store;

const SAMPLE_SIZE: usize = 5;

/// Fetch the diagnostic snapshot for a project.
pub async fn check_indexing(store: &dyn Store, project_id: &str) -> Result<IndexStats> {
    store
        .get_project(project_id)
        .await?
        .ok_or_else(|| Error::ProjectNotFound(project_id.to_string()))?;

    Ok(store.index_stats(project_id, SAMPLE_SIZE).await?)
}

/// Print the snapshot for the CLI.
pub fn print_stats(stats: &IndexStats) {
    println!("Project: {}", stats.project_id);
    println!("  Commits indexed:    {}", stats.commit_count);
    println!("  Files embedded:     {}", stats.embedding_count);

    if !stats.sample.is_empty() {
        println!();
        println!("  Recent embeddings:");
        for entry in &stats.sample {
            println!(
                "    {:<48} {:<24} {}",
                entry.path,
                entry.model,
                format_ts_iso(entry.updated_at)
            );
        }
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
