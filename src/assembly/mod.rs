//! Exemplar assembly: turns ranked neighbors into few-shot text, builds
//! contrastive exemplar blocks and picks a consensus among candidate outputs.

pub mod assembler;
pub mod exemplar;

use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::retrieval::{CacheError, RetrievalError};

pub use assembler::{ConsensusChoice, ContextAssembler};
pub use exemplar::{capitalize, format_exemplar, ExemplarDoc};

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Length mismatch between {what}: {left} vs {right}")]
    LengthMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },

    #[error("No candidates to choose from")]
    EmptyCandidates,

    #[error(
        "Cached neighbor {index} for query {position} is out of range for {available} documents; invalidate the retrieval cache"
    )]
    StaleCache {
        position: usize,
        index: usize,
        available: usize,
    },

    #[error("Missing rating for document {document} of subject {subject}")]
    MissingRating { subject: usize, document: usize },

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}
