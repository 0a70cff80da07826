use std::thread;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::remote::RetryPolicy;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Invalid response body: {0}")]
    InvalidBody(String),
}

pub(crate) fn build_client(policy: &RetryPolicy) -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(policy.timeout)
        .build()
        .map_err(|e| ConfigError::Http(e.to_string()))
}

pub(crate) fn api_key_from_env(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingEnv(var))
}

fn retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Send the request produced by `build`, retrying transport failures,
/// 429 and 5xx per `policy`. Non-success responses become `RemoteError::Api`.
pub(crate) fn send_with_retry<F>(policy: &RetryPolicy, endpoint: &str, build: F) -> Result<Response, RemoteError>
where
    F: Fn() -> RequestBuilder,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        debug!(endpoint, attempt, "Sending remote request");
        let outcome = build().send();

        let error = match outcome {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status();
                let body = response.text().unwrap_or_default();
                let error = RemoteError::Api {
                    status: status.as_u16(),
                    body,
                };
                if !retryable(status) {
                    return Err(error);
                }
                error
            }
            Err(e) => RemoteError::Network(e.to_string()),
        };

        if attempt >= attempts {
            return Err(error);
        }

        let wait = policy.backoff(attempt);
        warn!(endpoint, attempt, wait_ms = wait.as_millis() as u64, error = %error, "Remote call failed, retrying");
        thread::sleep(wait);
        attempt += 1;
    }
}
