//! Semantic similarity: embeddings, an ANN index, and top-K pair
//! emission above `similarity_threshold` (S5, spec §4.5).

mod embed;
mod http_embedder;
mod index;

pub use embed::{Embedder, EmbeddingCache, l2_normalize};
pub use http_embedder::HttpEmbedder;
pub use index::{FlatIndex, IvfIndex};

use crate::config::SimilarityConfig;
use crate::types::{SectionId, SimilarityPair};

/// Below this corpus size an exact flat search is cheap enough that
/// building an IVF index (and accepting its recall loss) isn't worth it.
const EXACT_INDEX_THRESHOLD: usize = 1000;

/// Vectors used to train an IVF index's centroids, per spec §4.5.
const IVF_TRAINING_SIZE: usize = 5000;

enum SimilarityIndex {
    Exact(FlatIndex),
    Approximate(IvfIndex),
}

impl SimilarityIndex {
    fn build(entries: Vec<(SectionId, Vec<f32>)>) -> Self {
        if entries.len() <= EXACT_INDEX_THRESHOLD {
            SimilarityIndex::Exact(FlatIndex::build(entries))
        } else {
            SimilarityIndex::Approximate(IvfIndex::build(entries, IVF_TRAINING_SIZE))
        }
    }

    fn search(&self, id: &SectionId, vector: &[f32], k: usize, nprobe: usize) -> Vec<(SectionId, f32)> {
        match self {
            SimilarityIndex::Exact(idx) => idx.search(id, vector, k),
            SimilarityIndex::Approximate(idx) => idx.search(id, vector, k, nprobe),
        }
    }
}

/// Query every vector for its top-`K` neighbors (the index itself already
/// excludes the self-hit, so querying for `top_k` directly gives `top_k`
/// distinct others), keep neighbors at or above `similarity_threshold`,
/// and emit each pair exactly once in canonical `section_a < section_b`
/// order via [`SimilarityPair::new`]. The index is rebuilt fresh each run
/// rather than incrementally updated (spec §4.5).
pub fn top_k_pairs(entries: &[(SectionId, Vec<f32>)], config: &SimilarityConfig) -> Vec<SimilarityPair> {
    let index = SimilarityIndex::build(entries.to_vec());

    let mut seen = std::collections::HashSet::new();
    let mut pairs = Vec::new();

    for (id, vector) in entries {
        let neighbors = index.search(id, vector, config.top_k, config.ivf_nprobe);
        for (other, score) in neighbors {
            if score < config.similarity_threshold {
                continue;
            }
            let pair = SimilarityPair::new(id.clone(), other, score);
            if seen.insert((pair.section_a.clone(), pair.section_b.clone())) {
                pairs.push(pair);
            }
        }
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_canonical_order_and_respects_threshold() {
        let config = SimilarityConfig {
            top_k: 5,
            similarity_threshold: 0.99,
            ..SimilarityConfig::default()
        };
        let entries = vec![
            (SectionId::from("b"), vec![1.0, 0.0]),
            (SectionId::from("a"), vec![1.0, 0.0]),
            (SectionId::from("c"), vec![0.0, 1.0]),
        ];
        let pairs = top_k_pairs(&entries, &config);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].section_a, SectionId::from("a"));
        assert_eq!(pairs[0].section_b, SectionId::from("b"));
    }
}
