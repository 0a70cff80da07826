pub mod chat;
pub mod dataset;
pub mod identifiers;

pub use chat::{ChatHistory, ChatTurn, Prompt, Role};
pub use dataset::{Dataset, FieldNames, GroundTruthLabel, InMemoryDataset, RetrievalData};
pub use identifiers::CacheKey;
