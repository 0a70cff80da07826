use std::path::Path;

use tokenizers::Tokenizer;

use crate::budget::{TokenCountError, TokenCounter};

/// Local subword counter backed by a Hugging Face `tokenizer.json`.
///
/// Counts include the tokenizer's special tokens, as a plain encode call
/// would produce them.
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
}

impl HfTokenCounter {
    pub fn from_file(path: &Path) -> Result<Self, TokenCountError> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| TokenCountError::Tokenizer(format!("Failed to load {}: {e}", path.display())))?;
        Ok(Self { tokenizer })
    }
}

impl TokenCounter for HfTokenCounter {
    fn count_tokens(&self, content: &str) -> Result<usize, TokenCountError> {
        let encoding = self
            .tokenizer
            .encode(content, true)
            .map_err(|e| TokenCountError::Tokenizer(e.to_string()))?;
        Ok(encoding.len())
    }
}
