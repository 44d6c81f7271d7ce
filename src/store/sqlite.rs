//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation to SQL against the schema created by
//! `migrate::run_migrations`. The batch commit insert runs inside a single
//! transaction with `ON CONFLICT .. DO NOTHING`, so a concurrent ingestion
//! run racing on the same project loses the race quietly instead of
//! duplicating or corrupting rows.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::models::{IndexSample, IndexStats, NewCommit, Project, SourceEmbedding};
use crate::vectors::{blob_to_vec, vec_to_blob};

use super::Store;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_project(&self, project: &Project) -> Result<()> {
        sqlx::query("INSERT INTO projects (id, name, repo_url) VALUES (?, ?, ?)")
            .bind(&project.id)
            .bind(&project.name)
            .bind(&project.repo_url)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT id, name, repo_url FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Project {
            id: r.get("id"),
            name: r.get("name"),
            repo_url: r.get("repo_url"),
        }))
    }

    async fn commit_hashes(&self, project_id: &str) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT commit_hash FROM commits WHERE project_id = ?")
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|r| r.get("commit_hash")).collect())
    }

    async fn insert_commits(&self, project_id: &str, rows: &[NewCommit]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT INTO commits (project_id, commit_hash, message, author_name,
                                     author_avatar, authored_at, summary)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(project_id, commit_hash) DO NOTHING
                "#,
            )
            .bind(project_id)
            .bind(&row.info.hash)
            .bind(&row.info.message)
            .bind(&row.info.author_name)
            .bind(&row.info.author_avatar)
            .bind(row.info.authored_at.timestamp())
            .bind(&row.summary)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn upsert_embedding(&self, row: &SourceEmbedding) -> Result<()> {
        let blob = vec_to_blob(&row.vector);

        sqlx::query(
            r#"
            INSERT INTO source_embeddings (project_id, path, summary, embedding,
                                           model, dims, content_hash, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_id, path) DO UPDATE SET
                summary = excluded.summary,
                embedding = excluded.embedding,
                model = excluded.model,
                dims = excluded.dims,
                content_hash = excluded.content_hash,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&row.project_id)
        .bind(&row.path)
        .bind(&row.summary)
        .bind(&blob)
        .bind(&row.model)
        .bind(row.dims as i64)
        .bind(&row.content_hash)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn embedding_content_hash(
        &self,
        project_id: &str,
        path: &str,
    ) -> Result<Option<String>> {
        let hash: Option<String> = sqlx::query_scalar(
            "SELECT content_hash FROM source_embeddings WHERE project_id = ? AND path = ?",
        )
        .bind(project_id)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(hash)
    }

    async fn embeddings_for_model(
        &self,
        project_id: &str,
        model: &str,
    ) -> Result<Vec<SourceEmbedding>> {
        let rows = sqlx::query(
            r#"
            SELECT project_id, path, summary, embedding, model, dims, content_hash, updated_at
            FROM source_embeddings
            WHERE project_id = ? AND model = ?
            "#,
        )
        .bind(project_id)
        .bind(model)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let blob: Vec<u8> = r.get("embedding");
                let dims: i64 = r.get("dims");
                SourceEmbedding {
                    project_id: r.get("project_id"),
                    path: r.get("path"),
                    summary: r.get("summary"),
                    vector: blob_to_vec(&blob),
                    model: r.get("model"),
                    dims: dims as usize,
                    content_hash: r.get("content_hash"),
                    updated_at: r.get("updated_at"),
                }
            })
            .collect())
    }

    async fn index_stats(&self, project_id: &str, sample: usize) -> Result<IndexStats> {
        let commit_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM commits WHERE project_id = ?")
                .bind(project_id)
                .fetch_one(&self.pool)
                .await?;

        let embedding_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM source_embeddings WHERE project_id = ?")
                .bind(project_id)
                .fetch_one(&self.pool)
                .await?;

        let sample_rows = sqlx::query(
            r#"
            SELECT path, model, updated_at FROM source_embeddings
            WHERE project_id = ?
            ORDER BY updated_at DESC, path ASC
            LIMIT ?
            "#,
        )
        .bind(project_id)
        .bind(sample as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(IndexStats {
            project_id: project_id.to_string(),
            commit_count,
            embedding_count,
            sample: sample_rows
                .iter()
                .map(|r| IndexSample {
                    path: r.get("path"),
                    model: r.get("model"),
                    updated_at: r.get("updated_at"),
                })
                .collect(),
        })
    }
}
