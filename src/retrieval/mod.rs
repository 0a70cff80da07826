pub mod cache;
pub mod ranker;
pub mod store;

use thiserror::Error;

use crate::embedding::EmbeddingError;

pub use cache::{CacheError, FlushPolicy, RetrievalCache, WriteMode};
pub use ranker::{NeighborRanker, Ranking};
pub use store::{InMemoryStore, NeighborStore};

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Cannot rank against an empty candidate pool")]
    EmptyCandidates,
    #[error("Expected exactly one query, got {0}")]
    QueryCount(usize),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}
