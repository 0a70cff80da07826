//! Text embedding boundary.
//!
//! Providers map text to fixed-length vectors and define the similarity used
//! for ranking. Anything that has already been encoded can be handed back as
//! [`EmbeddingInput::Vectors`] and is passed through without another trip to
//! the backend.

pub mod hashing;
pub mod similarity;

use std::borrow::Cow;

use thiserror::Error;

pub use hashing::HashingEmbedder;
pub use similarity::{cosine_similarity, similarity_matrix};

pub type Embedding = Vec<f32>;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding backend failed: {0}")]
    Backend(String),
    #[error("Embedding backend returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },
}

pub trait EmbeddingProvider {
    /// Stable model identifier; part of the retrieval cache key.
    fn model_name(&self) -> &str;

    /// Encode a batch of texts, one vector per input, in input order.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError>;

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for &P {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        (**self).embed(texts)
    }

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        (**self).similarity(a, b)
    }
}

/// Either raw text still to be encoded, or vectors produced earlier.
#[derive(Debug, Clone)]
pub enum EmbeddingInput<'a> {
    Texts(Vec<&'a str>),
    Vectors(&'a [Embedding]),
}

impl<'a> EmbeddingInput<'a> {
    pub fn text(text: &'a str) -> Self {
        EmbeddingInput::Texts(vec![text])
    }

    pub fn texts<S: AsRef<str>>(texts: &'a [S]) -> Self {
        EmbeddingInput::Texts(texts.iter().map(|s| s.as_ref()).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            EmbeddingInput::Texts(texts) => texts.len(),
            EmbeddingInput::Vectors(vectors) => vectors.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> From<&'a [Embedding]> for EmbeddingInput<'a> {
    fn from(vectors: &'a [Embedding]) -> Self {
        EmbeddingInput::Vectors(vectors)
    }
}

/// Encode `input` with `provider`; pre-computed vectors are borrowed as-is.
pub fn encode<'a, P>(provider: &P, input: EmbeddingInput<'a>) -> Result<Cow<'a, [Embedding]>, EmbeddingError>
where
    P: EmbeddingProvider + ?Sized,
{
    match input {
        EmbeddingInput::Vectors(vectors) => Ok(Cow::Borrowed(vectors)),
        EmbeddingInput::Texts(texts) => {
            if texts.is_empty() {
                return Ok(Cow::Owned(Vec::new()));
            }
            let vectors = provider.embed(&texts)?;
            if vectors.len() != texts.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: texts.len(),
                    actual: vectors.len(),
                });
            }
            Ok(Cow::Owned(vectors))
        }
    }
}
