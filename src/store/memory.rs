//! In-memory [`Store`] implementation for tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Mirrors the SQLite backend's semantics: batch inserts are all-or-nothing,
//! duplicate commit hashes are skipped, embedding upserts replace by
//! (project, path).

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{IndexSample, IndexStats, NewCommit, Project, SourceEmbedding};

use super::Store;

struct StoredCommit {
    project_id: String,
    row: NewCommit,
}

/// In-memory store for tests and examples.
#[derive(Default)]
pub struct InMemoryStore {
    projects: RwLock<HashMap<String, Project>>,
    commits: RwLock<Vec<StoredCommit>>,
    embeddings: RwLock<Vec<SourceEmbedding>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commit rows stored for a project (test helper).
    pub fn commit_count(&self, project_id: &str) -> usize {
        self.commits
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.project_id == project_id)
            .count()
    }

    /// (hash, summary) pairs in insertion order (test helper).
    pub fn commit_summaries(&self, project_id: &str) -> Vec<(String, String)> {
        self.commits
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.project_id == project_id)
            .map(|c| (c.row.info.hash.clone(), c.row.summary.clone()))
            .collect()
    }

    /// All embedding rows for a project regardless of model (test helper).
    pub fn all_embeddings(&self, project_id: &str) -> Vec<SourceEmbedding> {
        self.embeddings
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.project_id == project_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_project(&self, project: &Project) -> Result<()> {
        let mut projects = self.projects.write().unwrap();
        if projects.contains_key(&project.id) {
            anyhow::bail!("project '{}' already exists", project.id);
        }
        projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        Ok(self.projects.read().unwrap().get(id).cloned())
    }

    async fn commit_hashes(&self, project_id: &str) -> Result<HashSet<String>> {
        Ok(self
            .commits
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.project_id == project_id)
            .map(|c| c.row.info.hash.clone())
            .collect())
    }

    async fn insert_commits(&self, project_id: &str, rows: &[NewCommit]) -> Result<u64> {
        let mut commits = self.commits.write().unwrap();
        let existing: HashSet<String> = commits
            .iter()
            .filter(|c| c.project_id == project_id)
            .map(|c| c.row.info.hash.clone())
            .collect();

        let mut inserted = 0u64;
        for row in rows {
            if existing.contains(&row.info.hash) {
                continue;
            }
            commits.push(StoredCommit {
                project_id: project_id.to_string(),
                row: row.clone(),
            });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn upsert_embedding(&self, row: &SourceEmbedding) -> Result<()> {
        let mut embeddings = self.embeddings.write().unwrap();
        embeddings.retain(|e| !(e.project_id == row.project_id && e.path == row.path));
        embeddings.push(row.clone());
        Ok(())
    }

    async fn embedding_content_hash(
        &self,
        project_id: &str,
        path: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .embeddings
            .read()
            .unwrap()
            .iter()
            .find(|e| e.project_id == project_id && e.path == path)
            .map(|e| e.content_hash.clone()))
    }

    async fn embeddings_for_model(
        &self,
        project_id: &str,
        model: &str,
    ) -> Result<Vec<SourceEmbedding>> {
        Ok(self
            .embeddings
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.project_id == project_id && e.model == model)
            .cloned()
            .collect())
    }

    async fn index_stats(&self, project_id: &str, sample: usize) -> Result<IndexStats> {
        let commit_count = self.commit_count(project_id) as i64;
        let embeddings = self.embeddings.read().unwrap();

        let mut rows: Vec<&SourceEmbedding> = embeddings
            .iter()
            .filter(|e| e.project_id == project_id)
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.path.cmp(&b.path)));

        Ok(IndexStats {
            project_id: project_id.to_string(),
            commit_count,
            embedding_count: rows.len() as i64,
            sample: rows
                .iter()
                .take(sample)
                .map(|e| IndexSample {
                    path: e.path.clone(),
                    model: e.model.clone(),
                    updated_at: e.updated_at,
                })
                .collect(),
        })
    }
}
