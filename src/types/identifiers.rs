use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Identifies one persisted ranking artifact: a (dataset, embedding model) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    dataset_tag: String,
    model_name: String,
}

impl CacheKey {
    pub fn new(dataset_tag: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            dataset_tag: dataset_tag.into(),
            model_name: model_name.into(),
        }
    }

    pub fn dataset_tag(&self) -> &str {
        &self.dataset_tag
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// `{dataset_tag}_{model_name}.json`, with path separators in the model
    /// name flattened so hub-style names (`org/model`) stay a single file.
    pub fn file_name(&self) -> String {
        let model = self.model_name.replace(['/', '\\'], "_");
        format!("{}_{}.json", self.dataset_tag, model)
    }

    /// `{storage_root}/retrieval_res/{file_name}`
    pub fn artifact_path(&self, storage_root: &Path) -> PathBuf {
        storage_root.join("retrieval_res").join(self.file_name())
    }
}
