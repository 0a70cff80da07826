use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenCountError {
    #[error("Tokenizer failed: {0}")]
    Tokenizer(String),
    #[error("Remote token counting failed: {0}")]
    Remote(String),
    #[error("Unexpected token count response: {0}")]
    InvalidResponse(String),
}

pub trait TokenCounter {
    fn count_tokens(&self, content: &str) -> Result<usize, TokenCountError>;
}

pub type SharedCounter = Arc<dyn TokenCounter + Send + Sync>;

impl<T: TokenCounter + ?Sized> TokenCounter for Arc<T> {
    fn count_tokens(&self, content: &str) -> Result<usize, TokenCountError> {
        (**self).count_tokens(content)
    }
}

impl<T: TokenCounter + ?Sized> TokenCounter for &T {
    fn count_tokens(&self, content: &str) -> Result<usize, TokenCountError> {
        (**self).count_tokens(content)
    }
}

/// Approximate GPT-style tokenization
/// tokens(content) := ceil(len(content) / 4)
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTokenCounter;

impl TokenCounter for ApproxTokenCounter {
    fn count_tokens(&self, content: &str) -> Result<usize, TokenCountError> {
        Ok(content.len().div_ceil(4))
    }
}
