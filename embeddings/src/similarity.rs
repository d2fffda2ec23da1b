//! Similarity computation for embeddings.

use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Cosine of the angle between `a` and `b`, in `[-1.0, 1.0]`.
///
/// A zero-norm input yields 0.0 rather than an error.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    // The square of any finite f32 neither underflows nor overflows in f64.
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        trace!("degenerate zero-norm vector, similarity defined as 0");
        return Ok(0.0);
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    Ok(similarity.clamp(-1.0, 1.0) as f32)
}

/// Straight-line distance between `a` and `b`.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let sum: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();

    Ok(sum.sqrt())
}

/// Unnormalized inner product of `a` and `b`.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// The best match returned by [`find_most_similar`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MostSimilar {
    /// Identifier of the best-matching document.
    pub id: String,

    /// Its cosine similarity to the query.
    pub score: f32,
}

/// One hit from [`find_top_k`] or an index search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub id: String,

    /// Cosine similarity to the query.
    pub score: f32,

    /// Metadata stored with the entry, if any.
    pub metadata: Option<serde_json::Value>,
}

impl SimilarityResult {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Ranking key: NaN scores sort below every real score.
fn rank(score: f32) -> OrderedFloat<f32> {
    if score.is_nan() {
        OrderedFloat(f32::NEG_INFINITY)
    } else {
        OrderedFloat(score)
    }
}

/// Order two scored candidates, best first: higher score, then smaller id.
fn compare_scored(a: (&str, f32), b: (&str, f32)) -> Ordering {
    rank(b.1).cmp(&rank(a.1)).then_with(|| a.0.cmp(b.0))
}

/// Find the document whose embedding is most similar to `query`.
///
/// Accepts any collection of `(id, embedding)` pairs, e.g. a `HashMap<String,
/// Embedding>` or a slice of tuples. Every candidate's length is checked
/// before any score is computed; when several candidates mismatch, the error
/// names the lexicographically smallest id. Exact score ties resolve to the
/// smallest id, so the result never depends on iteration order.
pub fn find_most_similar<I, K, V>(document_embeddings: I, query: &[f32]) -> Result<MostSimilar>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<[f32]>,
{
    let candidates: Vec<(K, V)> = document_embeddings.into_iter().collect();
    if candidates.is_empty() {
        return Err(EmbeddingError::NoCandidates);
    }

    let mismatch = candidates
        .iter()
        .filter(|(_, embedding)| embedding.as_ref().len() != query.len())
        .min_by(|(a, _), (b, _)| a.as_ref().cmp(b.as_ref()));
    if let Some((id, embedding)) = mismatch {
        return Err(EmbeddingError::CandidateDimensionMismatch {
            id: id.as_ref().to_string(),
            expected: query.len(),
            actual: embedding.as_ref().len(),
        });
    }

    let mut best: Option<(&str, f32)> = None;
    for (id, embedding) in &candidates {
        let score = cosine_similarity(embedding.as_ref(), query)?;
        let candidate = (id.as_ref(), score);
        best = match best {
            Some(current) if compare_scored(current, candidate) != Ordering::Greater => {
                Some(current)
            }
            _ => Some(candidate),
        };
    }

    let (id, score) = best.ok_or(EmbeddingError::NoCandidates)?;
    trace!("most similar candidate: {id} ({score:.4})");
    Ok(MostSimilar {
        id: id.to_string(),
        score,
    })
}

/// The `k` best candidates scoring at least `min_score`.
///
/// Results are ordered by score descending, ties by id ascending.
pub fn find_top_k(
    query: &[f32],
    candidates: &[(String, Embedding)],
    k: usize,
    min_score: f32,
) -> Result<Vec<SimilarityResult>> {
    let mut scores: Vec<(&str, f32)> = Vec::with_capacity(candidates.len());

    for (id, embedding) in candidates {
        let score = cosine_similarity(query, embedding)?;
        if score >= min_score {
            scores.push((id.as_str(), score));
        }
    }

    scores.sort_by(|a, b| compare_scored(*a, *b));

    Ok(scores
        .into_iter()
        .take(k)
        .map(|(id, score)| SimilarityResult::new(id, score))
        .collect())
}

/// Scale `embedding` to unit length in place. Zero vectors are left alone.
pub fn normalize(embedding: &mut [f32]) {
    let magnitude = embedding
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt();
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x = (f64::from(*x) / magnitude) as f32;
        }
    }
}

/// Element-wise mean. Empty input gives an empty vector.
pub fn average(embeddings: &[Embedding]) -> Result<Embedding> {
    let Some(first) = embeddings.first() else {
        return Ok(Vec::new());
    };

    let dim = first.len();
    for e in embeddings {
        if e.len() != dim {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dim,
                actual: e.len(),
            });
        }
    }

    let n = embeddings.len() as f32;
    let mut result = vec![0.0f32; dim];

    for embedding in embeddings {
        for (slot, val) in result.iter_mut().zip(embedding) {
            *slot += val / n;
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![0.3, -1.2, 4.0];
        let sim = cosine_similarity(&a, &a).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_symmetric() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![-2.0, 0.5, 1.0];
        assert_eq!(
            cosine_similarity(&a, &b).unwrap(),
            cosine_similarity(&b, &a).unwrap()
        );
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let sim = cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap();
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_cosine_similarity_extreme_magnitudes() {
        let tiny = [1e-30_f32, 0.0];
        let huge = [1e20_f32, 0.0];
        assert_eq!(cosine_similarity(&tiny, &tiny).unwrap(), 1.0);
        assert_eq!(cosine_similarity(&huge, &huge).unwrap(), 1.0);
        assert_eq!(cosine_similarity(&tiny, &[-1e20, 0.0]).unwrap(), -1.0);
    }

    #[test]
    fn test_normalize_huge_vector() {
        let mut v = vec![3e20_f32, 4e20];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_length_mismatch() {
        let err = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_find_most_similar_picks_closest_direction() {
        let mut docs: HashMap<String, Embedding> = HashMap::new();
        docs.insert("d1".to_string(), vec![1.0, 0.0]);
        docs.insert("d2".to_string(), vec![0.0, 1.0]);

        let best = find_most_similar(&docs, &[0.9, 0.1]).unwrap();
        assert_eq!(best.id, "d1");
        assert!(best.score > 0.9);
    }

    #[test]
    fn test_find_most_similar_empty() {
        let docs: HashMap<String, Embedding> = HashMap::new();
        let err = find_most_similar(&docs, &[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, EmbeddingError::NoCandidates));
    }

    #[test]
    fn test_find_most_similar_reports_smallest_mismatched_id() {
        let docs: Vec<(&str, Embedding)> = vec![
            ("zeta", vec![1.0, 0.0, 0.0]),
            ("alpha", vec![1.0, 0.0]),
            ("beta", vec![1.0]),
        ];

        let err = find_most_similar(docs, &[1.0, 0.0]).unwrap_err();
        assert!(err.is_dimension_mismatch());
        match err {
            EmbeddingError::CandidateDimensionMismatch {
                id,
                expected,
                actual,
            } => {
                assert_eq!(id, "beta");
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_find_most_similar_ties_break_by_id() {
        let forward: Vec<(&str, Embedding)> = vec![("b", vec![1.0, 0.0]), ("a", vec![2.0, 0.0])];
        let backward: Vec<(&str, Embedding)> =
            vec![("a", vec![2.0, 0.0]), ("b", vec![1.0, 0.0])];

        assert_eq!(find_most_similar(forward, &[1.0, 0.0]).unwrap().id, "a");
        assert_eq!(find_most_similar(backward, &[1.0, 0.0]).unwrap().id, "a");
    }

    #[test]
    fn test_find_most_similar_single_negative_candidate() {
        let docs: BTreeMap<&str, Vec<f32>> = [("only", vec![-1.0, 0.0])].into_iter().collect();
        let best = find_most_similar(&docs, &[1.0, 0.0]).unwrap();
        assert_eq!(best.id, "only");
        assert!((best.score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_find_most_similar_ranks_nan_last() {
        let docs = vec![("nan", vec![f32::NAN, 0.0]), ("real", vec![-1.0, 0.0])];
        let best = find_most_similar(docs, &[1.0, 0.0]).unwrap();
        assert_eq!(best.id, "real");
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_dot_product_and_distance() {
        assert_eq!(dot_product(&[1.0, 2.0], &[3.0, 4.0]).unwrap(), 11.0);
        assert_eq!(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]).unwrap(), 5.0);
        assert!(dot_product(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_average() {
        let avg = average(&[vec![1.0, 3.0], vec![3.0, 5.0]]).unwrap();
        assert_eq!(avg, vec![2.0, 4.0]);
        assert!(average(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_find_top_k() {
        let query = vec![1.0, 0.0, 0.0];
        let candidates = vec![
            ("a".to_string(), vec![1.0, 0.0, 0.0]), // similarity 1.0
            ("b".to_string(), vec![0.0, 1.0, 0.0]), // similarity 0.0
            ("c".to_string(), vec![0.7, 0.7, 0.0]), // similarity ~0.7
        ];

        let results = find_top_k(&query, &candidates, 2, 0.0).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "c");
    }

    #[test]
    fn test_find_top_k_min_score() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            ("a".to_string(), vec![1.0, 0.0]),
            ("b".to_string(), vec![-1.0, 0.0]),
        ];

        let results = find_top_k(&query, &candidates, 10, 0.5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }
}
