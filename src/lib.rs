//! Retrieval-augmented context assembly for LLM prompts.
//!
//! `context-assembly` ranks a subject's documents against a query by
//! embedding similarity, caches those rankings on disk per (dataset,
//! embedding model), renders the top neighbors as few-shot exemplars, and
//! trims chat history and retrieved context to fit a model's token window.
//!
//! Rankings are deterministic for fixed embeddings: ties keep candidate
//! order, and a warm cache returns exactly what a cold run computed.

pub mod assembly;
pub mod budget;
pub mod config;
pub mod embedding;
pub mod remote;
pub mod retrieval;
pub mod types;

pub use assembly::{AssemblyError, ConsensusChoice, ContextAssembler};
pub use budget::{BudgetError, PreparedContext, TokenBudgetManager, TokenCounter};
pub use config::{ConfigError, Settings};
pub use embedding::{EmbeddingInput, EmbeddingProvider};
pub use retrieval::{NeighborRanker, RetrievalCache};
