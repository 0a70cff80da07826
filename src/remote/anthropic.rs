use reqwest::blocking::Client;
use serde::Deserialize;

use crate::budget::{TokenCountError, TokenCounter};
use crate::config::ConfigError;
use crate::remote::client::{api_key_from_env, build_client, send_with_retry};
use crate::remote::RetryPolicy;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Token counts from Anthropic's `messages/count_tokens` endpoint.
pub struct AnthropicTokenCounter {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct CountResponse {
    input_tokens: usize,
}

impl AnthropicTokenCounter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, retry: RetryPolicy) -> Result<Self, ConfigError> {
        Ok(Self {
            client: build_client(&retry)?,
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            retry,
        })
    }

    /// Reads the key from `ANTHROPIC_API_KEY`.
    pub fn from_env(model: impl Into<String>, retry: RetryPolicy) -> Result<Self, ConfigError> {
        Self::new(api_key_from_env(API_KEY_ENV)?, model, retry)
    }

    /// Custom base URL (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl TokenCounter for AnthropicTokenCounter {
    fn count_tokens(&self, content: &str) -> Result<usize, TokenCountError> {
        // The endpoint rejects empty message content.
        if content.is_empty() {
            return Ok(0);
        }

        let url = format!("{}/v1/messages/count_tokens", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": content }],
        });

        let response = send_with_retry(&self.retry, "anthropic.count_tokens", || {
            self.client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
        })
        .map_err(|e| TokenCountError::Remote(e.to_string()))?;

        let parsed: CountResponse = response
            .json()
            .map_err(|e| TokenCountError::InvalidResponse(e.to_string()))?;
        Ok(parsed.input_tokens)
    }
}
