use super::{Embedding, EmbeddingProvider};

/// Cosine similarity in [-1, 1].
///
/// Returns 0.0 when the lengths differ or either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = f64::from(*x);
        let y = f64::from(*y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-12 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Full pairwise similarity matrix under the provider's similarity;
/// `matrix[i][j] = sim(rows[i], cols[j])`.
pub fn similarity_matrix<P>(provider: &P, rows: &[Embedding], cols: &[Embedding]) -> Vec<Vec<f32>>
where
    P: EmbeddingProvider + ?Sized,
{
    rows.iter()
        .map(|r| cols.iter().map(|c| provider.similarity(r, c)).collect())
        .collect()
}
