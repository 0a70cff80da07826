use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::ConfigError;
use crate::embedding::{Embedding, EmbeddingError, EmbeddingProvider};
use crate::remote::client::{api_key_from_env, build_client, send_with_retry};
use crate::remote::{RemoteError, RetryPolicy};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Embeddings from an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Embedding,
}

impl OpenAiEmbedder {
    pub fn new(model: impl Into<String>, retry: RetryPolicy) -> Result<Self, ConfigError> {
        Ok(Self {
            client: build_client(&retry)?,
            base_url: DEFAULT_BASE_URL.into(),
            api_key: None,
            model: model.into(),
            retry,
        })
    }

    /// Reads the key from `OPENAI_API_KEY`.
    pub fn from_env(model: impl Into<String>, retry: RetryPolicy) -> Result<Self, ConfigError> {
        Ok(Self::new(model, retry)?.with_api_key(api_key_from_env(API_KEY_ENV)?))
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Self-hosted servers usually need no key, only a base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, texts: &[&str]) -> Result<Vec<Embedding>, RemoteError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = send_with_retry(&self.retry, "openai.embeddings", || {
            let request = self.client.post(&url).json(&body);
            match &self.api_key {
                Some(key) => request.bearer_auth(key),
                None => request,
            }
        })?;

        let parsed: EmbeddingResponse = response
            .json()
            .map_err(|e| RemoteError::InvalidBody(e.to_string()))?;
        Ok(parsed.into_ordered())
    }
}

impl EmbeddingResponse {
    /// Vectors in input order; servers may return `data` shuffled.
    fn into_ordered(mut self) -> Vec<Embedding> {
        self.data.sort_by_key(|d| d.index);
        self.data.into_iter().map(|d| d.embedding).collect()
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        self.request(texts)
            .map_err(|e| EmbeddingError::Backend(e.to_string()))
    }
}
