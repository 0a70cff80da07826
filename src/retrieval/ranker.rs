use std::borrow::Cow;

use crate::embedding::{self, Embedding, EmbeddingError, EmbeddingInput, EmbeddingProvider};
use crate::retrieval::RetrievalError;

/// Scores of one query against a candidate pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    /// Similarity per candidate, in candidate order.
    pub scores: Vec<f32>,
    /// Candidate indices by descending score; ties keep ascending index.
    pub sorted_indices: Vec<usize>,
}

impl Ranking {
    pub fn top(&self, k: usize) -> &[usize] {
        &self.sorted_indices[..k.min(self.sorted_indices.len())]
    }
}

pub struct NeighborRanker<E> {
    embedder: E,
}

impl<E: EmbeddingProvider> NeighborRanker<E> {
    pub fn new(embedder: E) -> Self {
        Self { embedder }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    pub fn encode<'a>(&self, input: EmbeddingInput<'a>) -> Result<Cow<'a, [Embedding]>, EmbeddingError> {
        embedding::encode(&self.embedder, input)
    }

    /// Rank `candidates` against a single `query`.
    ///
    /// A one-document pool still yields a one-element ranking; an empty pool
    /// is an error.
    pub fn rank(&self, query: EmbeddingInput<'_>, candidates: EmbeddingInput<'_>) -> Result<Ranking, RetrievalError> {
        if candidates.is_empty() {
            return Err(RetrievalError::EmptyCandidates);
        }
        if query.len() != 1 {
            return Err(RetrievalError::QueryCount(query.len()));
        }

        let query = self.encode(query)?;
        let candidates = self.encode(candidates)?;

        let scores: Vec<f32> = candidates
            .iter()
            .map(|c| self.embedder.similarity(&query[0], c))
            .collect();

        Ok(Ranking {
            sorted_indices: sort_descending(&scores),
            scores,
        })
    }

    /// Convenience wrapper for plain text on both sides.
    pub fn rank_texts<S: AsRef<str>>(&self, query: &str, candidates: &[S]) -> Result<Ranking, RetrievalError> {
        self.rank(EmbeddingInput::text(query), EmbeddingInput::texts(candidates))
    }
}

fn sort_descending(scores: &[f32]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_keep_ascending_index() {
        assert_eq!(sort_descending(&[0.5, 0.9, 0.5, 0.1]), vec![1, 0, 2, 3]);
    }

    #[test]
    fn top_clamps_to_pool_size() {
        let ranking = Ranking {
            scores: vec![0.1, 0.2],
            sorted_indices: vec![1, 0],
        };
        assert_eq!(ranking.top(5), &[1, 0]);
        assert_eq!(ranking.top(0), &[] as &[usize]);
    }
}
