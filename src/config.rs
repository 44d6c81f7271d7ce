use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Pool size; `rmind` is a short-lived CLI so a handful is plenty.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Environment variable holding the API token. Unset = anonymous access.
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token_env: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    /// `"openai"` or `"disabled"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub summary_model: Option<String>,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            summary_model: None,
            embedding_model: None,
            dims: None,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl AiConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// `"memory"`, `"sqlite"`, or `"none"` (fail-open: always allow).
    #[serde(default = "default_rl_backend")]
    pub backend: String,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            backend: "none".to_string(),
            window_secs: 60,
            max_requests: 50,
        }
    }
}

fn default_rl_backend() -> String {
    "none".to_string()
}
fn default_window_secs() -> u64 {
    60
}
fn default_max_requests() -> u64 {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// How many recent commits to fetch per poll.
    #[serde(default = "default_commit_count")]
    pub commit_count: usize,
    /// Concurrent summarization tasks in the fan-out.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Diffs longer than this are truncated before the AI call.
    #[serde(default = "default_max_diff_chars")]
    pub max_diff_chars: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            commit_count: default_commit_count(),
            max_concurrency: default_max_concurrency(),
            max_diff_chars: default_max_diff_chars(),
        }
    }
}

fn default_commit_count() -> usize {
    10
}
fn default_max_concurrency() -> usize {
    5
}
fn default_max_diff_chars() -> usize {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Optional similarity floor. Absent = no floor (weak matches allowed).
    #[serde(default)]
    pub min_similarity: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: None,
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Files larger than this are skipped by `index_tree`.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// File contents longer than this are truncated before the AI call.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            max_file_bytes: default_max_file_bytes(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}
fn default_max_file_bytes() -> u64 {
    256 * 1024
}
fn default_max_content_chars() -> usize {
    10_000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate ingest
    if config.ingest.commit_count == 0 {
        anyhow::bail!("ingest.commit_count must be > 0");
    }
    if config.ingest.max_concurrency == 0 {
        anyhow::bail!("ingest.max_concurrency must be > 0");
    }

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if let Some(floor) = config.retrieval.min_similarity {
        if !(-1.0..=1.0).contains(&floor) {
            anyhow::bail!("retrieval.min_similarity must be in [-1.0, 1.0]");
        }
    }

    // Validate rate limiting
    match config.rate_limit.backend.as_str() {
        "none" | "memory" | "sqlite" => {}
        other => anyhow::bail!(
            "Unknown rate_limit.backend: '{}'. Must be none, memory, or sqlite.",
            other
        ),
    }
    if config.rate_limit.window_secs == 0 {
        anyhow::bail!("rate_limit.window_secs must be > 0");
    }

    // Validate AI provider
    if config.ai.is_enabled() {
        if config.ai.summary_model.is_none() {
            anyhow::bail!(
                "ai.summary_model must be specified when provider is '{}'",
                config.ai.provider
            );
        }
        if config.ai.embedding_model.is_none() {
            anyhow::bail!(
                "ai.embedding_model must be specified when provider is '{}'",
                config.ai.provider
            );
        }
        if config.ai.dims.is_none() || config.ai.dims == Some(0) {
            anyhow::bail!(
                "ai.dims must be > 0 when provider is '{}'",
                config.ai.provider
            );
        }
    }

    match config.ai.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown AI provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}
