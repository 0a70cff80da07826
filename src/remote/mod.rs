//! Remote backends: vendor token-count endpoints and an OpenAI-compatible
//! embeddings endpoint. Every call is bounded by [`RetryPolicy`].
//!
//! The clients need the `http` feature; the policy itself is always
//! available so configuration parses the same either way.

pub mod retry;

#[cfg(feature = "http")]
pub mod anthropic;
#[cfg(feature = "http")]
pub mod client;
#[cfg(feature = "http")]
pub mod gemini;
#[cfg(feature = "http")]
pub mod openai;

pub use retry::RetryPolicy;

#[cfg(feature = "http")]
pub use anthropic::AnthropicTokenCounter;
#[cfg(feature = "http")]
pub use client::RemoteError;
#[cfg(feature = "http")]
pub use gemini::GeminiTokenCounter;
#[cfg(feature = "http")]
pub use openai::OpenAiEmbedder;
