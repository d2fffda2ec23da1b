//! Property-based tests for nearest-embedding retrieval.

use std::collections::HashMap;

use genai_embeddings::{Embedding, EmbeddingError, cosine_similarity, find_most_similar};
use proptest::prelude::*;

const DIM: usize = 8;

fn arb_vector() -> impl Strategy<Value = Embedding> {
    proptest::collection::vec(-10.0f32..10.0, DIM)
}

fn arb_candidates() -> impl Strategy<Value = HashMap<String, Embedding>> {
    proptest::collection::hash_map("[a-z]{1,6}", arb_vector(), 1..24)
}

proptest! {
    #[test]
    fn selected_score_is_maximal(docs in arb_candidates(), query in arb_vector()) {
        let best = find_most_similar(&docs, &query).unwrap();
        prop_assert!(docs.contains_key(&best.id));

        for (id, embedding) in &docs {
            let score = cosine_similarity(embedding, &query).unwrap();
            prop_assert!(
                best.score >= score,
                "{id} scored {score} above selected {} ({})",
                best.id,
                best.score
            );
        }
    }

    #[test]
    fn result_is_independent_of_iteration_order(
        docs in arb_candidates(),
        query in arb_vector(),
    ) {
        let forward: Vec<(String, Embedding)> = {
            let mut pairs: Vec<_> = docs.clone().into_iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            pairs
        };
        let mut backward = forward.clone();
        backward.reverse();

        prop_assert_eq!(
            find_most_similar(forward, &query).unwrap(),
            find_most_similar(backward, &query).unwrap()
        );
    }

    #[test]
    fn self_similarity_is_one(v in arb_vector()) {
        prop_assume!(v.iter().any(|x| *x != 0.0));
        let sim = cosine_similarity(&v, &v).unwrap();
        prop_assert!((sim - 1.0).abs() < 1e-4);
    }

    #[test]
    fn similarity_is_symmetric(a in arb_vector(), b in arb_vector()) {
        prop_assert_eq!(
            cosine_similarity(&a, &b).unwrap(),
            cosine_similarity(&b, &a).unwrap()
        );
    }

    #[test]
    fn mismatched_query_always_fails(docs in arb_candidates(), extra in 1usize..4) {
        let query = vec![1.0f32; DIM + extra];
        let err = find_most_similar(&docs, &query).unwrap_err();
        prop_assert!(err.is_dimension_mismatch());
    }
}

#[test]
fn empty_candidate_set_fails() {
    let docs: HashMap<String, Embedding> = HashMap::new();
    assert!(matches!(
        find_most_similar(&docs, &[1.0, 0.0]),
        Err(EmbeddingError::NoCandidates)
    ));
}
