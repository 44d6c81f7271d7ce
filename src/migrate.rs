use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema. Idempotent — safe to run on every `rmind init`.
///
/// The UNIQUE constraints on (project_id, commit_hash) and
/// (project_id, path) are the concurrency safety net: two ingestion runs
/// racing on the same project cannot produce duplicate rows.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Projects are created by `rmind project add` and read-only afterwards
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            repo_url TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS commits (
            project_id TEXT NOT NULL,
            commit_hash TEXT NOT NULL,
            message TEXT NOT NULL,
            author_name TEXT NOT NULL,
            author_avatar TEXT,
            authored_at INTEGER NOT NULL,
            summary TEXT NOT NULL,
            PRIMARY KEY (project_id, commit_hash),
            FOREIGN KEY (project_id) REFERENCES projects(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS source_embeddings (
            project_id TEXT NOT NULL,
            path TEXT NOT NULL,
            summary TEXT NOT NULL,
            embedding BLOB NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            content_hash TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (project_id, path),
            FOREIGN KEY (project_id) REFERENCES projects(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Sliding-window counters for the rate limiter's sqlite backend
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rate_counters (
            key TEXT NOT NULL,
            window_start INTEGER NOT NULL,
            count INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (key, window_start)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_commits_authored_at ON commits(project_id, authored_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_embeddings_model ON source_embeddings(project_id, model)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
