use reqwest::blocking::Client;
use serde::Deserialize;

use crate::budget::{TokenCountError, TokenCounter};
use crate::config::ConfigError;
use crate::remote::client::{api_key_from_env, build_client, send_with_retry};
use crate::remote::RetryPolicy;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Token counts from the Gemini `models/{model}:countTokens` endpoint.
pub struct GeminiTokenCounter {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountResponse {
    #[serde(default)]
    total_tokens: usize,
}

impl GeminiTokenCounter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, retry: RetryPolicy) -> Result<Self, ConfigError> {
        Ok(Self {
            client: build_client(&retry)?,
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            retry,
        })
    }

    /// Reads the key from `GOOGLE_API_KEY`.
    pub fn from_env(model: impl Into<String>, retry: RetryPolicy) -> Result<Self, ConfigError> {
        Self::new(api_key_from_env(API_KEY_ENV)?, model, retry)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl TokenCounter for GeminiTokenCounter {
    fn count_tokens(&self, content: &str) -> Result<usize, TokenCountError> {
        if content.is_empty() {
            return Ok(0);
        }

        let model = self.model.trim_start_matches("models/");
        let url = format!("{}/v1beta/models/{}:countTokens", self.base_url, model);
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": content }] }],
        });

        let response = send_with_retry(&self.retry, "gemini.count_tokens", || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .map_err(|e| TokenCountError::Remote(e.to_string()))?;

        let parsed: CountResponse = response
            .json()
            .map_err(|e| TokenCountError::InvalidResponse(e.to_string()))?;
        Ok(parsed.total_tokens)
    }
}
