//! Hosting API client.
//!
//! [`RepoHost`] is the seam between the pipeline and the source-hosting
//! provider: list recent commits, fetch one commit's unified diff. The
//! concrete [`GithubClient`] talks to the GitHub REST API over `reqwest`
//! with a request timeout and an optional bearer token; tests substitute
//! their own implementations.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::config::GithubConfig;
use crate::models::CommitInfo;

/// Source-hosting API operations the pipeline consumes.
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// The most recent `limit` commits, sorted descending by author date.
    /// Commits with equal dates keep the API's order.
    async fn list_commits(&self, repo_url: &str, limit: usize) -> Result<Vec<CommitInfo>>;

    /// The unified diff for one commit.
    async fn fetch_diff(&self, repo_url: &str, commit_hash: &str) -> Result<String>;
}

/// GitHub REST API client.
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let token = match &config.token_env {
            Some(var) => Some(std::env::var(var).with_context(|| {
                format!("github.token_env points at unset variable '{}'", var)
            })?),
            None => None,
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("repomind/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, url: &str, accept: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.get(url).header("Accept", accept);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }
}

#[async_trait]
impl RepoHost for GithubClient {
    async fn list_commits(&self, repo_url: &str, limit: usize) -> Result<Vec<CommitInfo>> {
        let (owner, repo) = parse_repo_url(repo_url)?;
        let url = format!(
            "{}/repos/{}/{}/commits?per_page={}",
            self.api_base, owner, repo, limit
        );

        let response = self
            .request(&url, "application/vnd.github+json")
            .send()
            .await
            .with_context(|| format!("Failed to list commits for {}", repo_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("GitHub API error {} listing commits: {}", status, body);
        }

        let body = response.text().await?;
        let mut commits = parse_commit_list(&body)?;
        sort_commits_desc(&mut commits);
        commits.truncate(limit);
        Ok(commits)
    }

    async fn fetch_diff(&self, repo_url: &str, commit_hash: &str) -> Result<String> {
        let (owner, repo) = parse_repo_url(repo_url)?;
        let url = format!(
            "{}/repos/{}/{}/commits/{}",
            self.api_base, owner, repo, commit_hash
        );

        let response = self
            .request(&url, "application/vnd.github.diff")
            .send()
            .await
            .with_context(|| format!("Failed to fetch diff for {}", commit_hash))?;

        let status = response.status();
        if !status.is_success() {
            bail!("GitHub API error {} fetching diff for {}", status, commit_hash);
        }

        Ok(response.text().await?)
    }
}

/// Extract (owner, repo) from an HTTPS or SSH remote URL.
pub fn parse_repo_url(repo_url: &str) -> Result<(String, String)> {
    // git@github.com:org/repo.git → org/repo
    let path = if let Some(rest) = repo_url.strip_prefix("git@") {
        rest.split_once(':').map(|(_, p)| p).unwrap_or(rest)
    } else if let Some(idx) = repo_url.find("://") {
        // https://github.com/org/repo.git → org/repo
        let after_scheme = &repo_url[idx + 3..];
        after_scheme.split_once('/').map(|(_, p)| p).unwrap_or("")
    } else {
        repo_url
    };

    let path = path.trim_end_matches('/').trim_end_matches(".git");
    let mut parts = path.split('/');

    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => bail!("Cannot parse owner/repo from URL: {}", repo_url),
    }
}

/// Stable descending sort by author date; equal dates keep input order.
pub fn sort_commits_desc(commits: &mut [CommitInfo]) {
    commits.sort_by(|a, b| b.authored_at.cmp(&a.authored_at));
}

#[derive(Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitDetail,
    author: Option<ApiUser>,
}

#[derive(Deserialize)]
struct ApiCommitDetail {
    message: String,
    author: Option<ApiGitAuthor>,
}

#[derive(Deserialize)]
struct ApiGitAuthor {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct ApiUser {
    avatar_url: Option<String>,
}

fn parse_commit_list(body: &str) -> Result<Vec<CommitInfo>> {
    let api_commits: Vec<ApiCommit> =
        serde_json::from_str(body).with_context(|| "Invalid commit list response")?;

    Ok(api_commits
        .into_iter()
        .map(|c| {
            let author = c.commit.author;
            CommitInfo {
                hash: c.sha,
                message: c.commit.message,
                author_name: author
                    .as_ref()
                    .and_then(|a| a.name.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                author_avatar: c.author.and_then(|u| u.avatar_url),
                authored_at: author
                    .and_then(|a| a.date)
                    .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap()),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_https_url() {
        let (owner, repo) = parse_repo_url("https://github.com/parallax-labs/repomind").unwrap();
        assert_eq!(owner, "parallax-labs");
        assert_eq!(repo, "repomind");
    }

    #[test]
    fn test_parse_https_url_with_git_suffix() {
        let (owner, repo) = parse_repo_url("https://github.com/org/repo.git").unwrap();
        assert_eq!((owner.as_str(), repo.as_str()), ("org", "repo"));
    }

    #[test]
    fn test_parse_ssh_url() {
        let (owner, repo) = parse_repo_url("git@github.com:org/repo.git").unwrap();
        assert_eq!((owner.as_str(), repo.as_str()), ("org", "repo"));
    }

    #[test]
    fn test_parse_invalid_url() {
        assert!(parse_repo_url("not-a-url").is_err());
        assert!(parse_repo_url("https://github.com/").is_err());
    }

    #[test]
    fn test_sort_desc_is_stable_on_ties() {
        let ts = |s: i64| Utc.timestamp_opt(s, 0).unwrap();
        let mk = |hash: &str, t: i64| CommitInfo {
            hash: hash.to_string(),
            message: String::new(),
            author_name: String::new(),
            author_avatar: None,
            authored_at: ts(t),
        };

        let mut commits = vec![mk("a", 100), mk("b", 200), mk("c", 200), mk("d", 50)];
        sort_commits_desc(&mut commits);

        let order: Vec<&str> = commits.iter().map(|c| c.hash.as_str()).collect();
        // b and c tie at 200 and keep their input order
        assert_eq!(order, vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn test_parse_commit_list() {
        let body = r#"[
            {
                "sha": "abc123",
                "commit": {
                    "message": "Fix ingestion race",
                    "author": { "name": "Ada", "date": "2026-01-02T03:04:05Z" }
                },
                "author": { "avatar_url": "https://avatars.example/ada" }
            },
            {
                "sha": "def456",
                "commit": { "message": "Initial commit", "author": null },
                "author": null
            }
        ]"#;

        let commits = parse_commit_list(body).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].hash, "abc123");
        assert_eq!(commits[0].author_name, "Ada");
        assert_eq!(
            commits[0].author_avatar.as_deref(),
            Some("https://avatars.example/ada")
        );
        assert_eq!(commits[1].author_name, "unknown");
        assert!(commits[1].author_avatar.is_none());
    }
}
