use serde::{Deserialize, Serialize};

/// How the ground-truth side of a document is labeled, if at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroundTruthLabel {
    /// Documents carry no ground truth; exemplars show the prompt text only.
    None,
    Text { name: String },
    /// Ground truth plus a per-document rating (review-style datasets).
    TextWithRating { name: String, rating: String },
}

/// Per-dataset field labels used when rendering exemplars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldNames {
    pub prompt: String,
    pub ground_truth: GroundTruthLabel,
}

impl FieldNames {
    pub fn prompt_only(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ground_truth: GroundTruthLabel::None,
        }
    }

    pub fn with_ground_truth(prompt: impl Into<String>, ground_truth: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ground_truth: GroundTruthLabel::Text {
                name: ground_truth.into(),
            },
        }
    }

    pub fn with_rating(
        prompt: impl Into<String>,
        ground_truth: impl Into<String>,
        rating: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            ground_truth: GroundTruthLabel::TextWithRating {
                name: ground_truth.into(),
                rating: rating.into(),
            },
        }
    }

    pub fn is_rated(&self) -> bool {
        matches!(self.ground_truth, GroundTruthLabel::TextWithRating { .. })
    }
}

/// Index-aligned retrieval inputs: `texts[i]` and `ground_truths[i]` are the
/// parallel document sets of subject `i`, queried with `queries[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalData {
    pub queries: Vec<String>,
    pub texts: Vec<Vec<String>>,
    pub ground_truths: Vec<Vec<String>>,
}

/// Source of documents, labels and ratings. Loading and formatting the
/// underlying corpus happens behind this trait.
pub trait Dataset {
    /// Short tag naming the dataset split; part of the cache key.
    fn tag(&self) -> &str;

    fn retrieval_data(&self) -> &RetrievalData;

    fn field_names(&self) -> &FieldNames;

    /// Ratings for the documents of subject `subject`, aligned with its
    /// texts. `None` for unrated datasets.
    fn ratings(&self, subject: usize) -> Option<&[String]>;
}

/// A dataset held entirely in memory.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    tag: String,
    fields: FieldNames,
    data: RetrievalData,
    ratings: Vec<Vec<String>>,
}

impl InMemoryDataset {
    pub fn new(tag: impl Into<String>, fields: FieldNames, data: RetrievalData) -> Self {
        Self {
            tag: tag.into(),
            fields,
            data,
            ratings: Vec::new(),
        }
    }

    pub fn with_ratings(mut self, ratings: Vec<Vec<String>>) -> Self {
        self.ratings = ratings;
        self
    }
}

impl Dataset for InMemoryDataset {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn retrieval_data(&self) -> &RetrievalData {
        &self.data
    }

    fn field_names(&self) -> &FieldNames {
        &self.fields
    }

    fn ratings(&self, subject: usize) -> Option<&[String]> {
        self.ratings.get(subject).map(Vec::as_slice)
    }
}
