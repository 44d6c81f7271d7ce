//! AI collaborator: summarization and embedding behind one trait.
//!
//! [`AiClient`] is the single request/response seam for all AI calls.
//! Implementations:
//! - **[`OpenAiClient`]** — chat completions for summaries, the embeddings
//!   endpoint for vectors, with batch-free single calls, retry, and backoff.
//! - **[`DisabledClient`]** — returns errors; used when AI is not configured.
//!
//! # Retry Strategy
//!
//! Transient errors retry with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::AiConfig;

const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

const SUMMARY_SYSTEM_PROMPT: &str = "You are an expert programmer. Summarize the given input \
    in a few short sentences for a teammate who has not read it: what changed or what the code \
    does, and why it matters. Plain prose, no markdown.";

/// AI operations the pipeline consumes.
///
/// `model_name` and `dims` identify the embedding-model version; stored
/// vectors are tagged with them so retrieval never compares vectors across
/// model versions.
#[async_trait]
pub trait AiClient: Send + Sync {
    /// Embedding model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Produce a short natural-language summary of the text.
    async fn summarize(&self, text: &str) -> Result<String>;

    /// Produce a fixed-dimension embedding vector for the text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// A no-op AI client that always returns errors.
///
/// Used when `ai.provider = "disabled"` in the configuration.
pub struct DisabledClient;

#[async_trait]
impl AiClient for DisabledClient {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn summarize(&self, _text: &str) -> Result<String> {
        bail!("AI provider is disabled")
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("AI provider is disabled")
    }
}

/// AI client backed by the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    summary_model: String,
    embedding_model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAiClient {
    pub fn new(config: &AiConfig) -> Result<Self> {
        let summary_model = config
            .summary_model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("ai.summary_model required for OpenAI provider"))?;
        let embedding_model = config
            .embedding_model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("ai.embedding_model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("ai.dims required for OpenAI provider"))?;

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key,
            summary_model,
            embedding_model,
            dims,
            max_retries: config.max_retries,
        })
    }

    /// POST with retry/backoff; returns the parsed JSON body on success.
    async fn post_with_retry(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(url)
                .bearer_auth(&self.api_key)
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("AI call failed after retries")))
    }
}

#[async_trait]
impl AiClient for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.embedding_model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn summarize(&self, text: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.summary_model,
            "messages": [
                { "role": "system", "content": SUMMARY_SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
            "temperature": 0.2,
        });

        let json = self.post_with_retry(CHAT_URL, &body).await?;
        parse_chat_response(&json)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.embedding_model,
            "input": text,
        });

        let json = self.post_with_retry(EMBEDDINGS_URL, &body).await?;
        let vector = parse_embedding_response(&json)?;

        if vector.len() != self.dims {
            bail!(
                "Embedding dimensionality mismatch: model returned {}, config says {}",
                vector.len(),
                self.dims
            );
        }
        Ok(vector)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing message content"))?;

    let content = content.trim();
    if content.is_empty() {
        bail!("Chat response was empty");
    }
    Ok(content.to_string())
}

fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.get(0))
        .and_then(|e| e.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing embedding"))?;

    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

/// Create the appropriate [`AiClient`] based on configuration.
///
/// | Config Value | Client |
/// |-------------|--------|
/// | `"disabled"` | [`DisabledClient`] |
/// | `"openai"` | [`OpenAiClient`] |
pub fn create_ai_client(config: &AiConfig) -> Result<Box<dyn AiClient>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledClient)),
        "openai" => Ok(Box::new(OpenAiClient::new(config)?)),
        other => bail!("Unknown AI provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [ { "message": { "content": "  A tidy summary.  " } } ]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "A tidy summary.");
    }

    #[test]
    fn test_parse_chat_response_empty_content() {
        let json = serde_json::json!({
            "choices": [ { "message": { "content": "   " } } ]
        });
        assert!(parse_chat_response(&json).is_err());
    }

    #[test]
    fn test_parse_embedding_response() {
        let json = serde_json::json!({
            "data": [ { "embedding": [0.1, -0.5, 2.0] } ]
        });
        let v = parse_embedding_response(&json).unwrap();
        assert_eq!(v.len(), 3);
        assert!((v[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_parse_embedding_response_missing() {
        let json = serde_json::json!({ "data": [] });
        assert!(parse_embedding_response(&json).is_err());
    }

    #[tokio::test]
    async fn test_disabled_client_errors() {
        let client = DisabledClient;
        assert!(client.summarize("text").await.is_err());
        assert!(client.embed("text").await.is_err());
        assert_eq!(client.model_name(), "disabled");
    }
}
