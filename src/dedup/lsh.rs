//! LSH banding over MinHash signatures to find candidate duplicate pairs
//! without the O(n²) comparisons a brute-force scan would require (S2).

use std::collections::{HashMap, HashSet};

use crate::types::SectionId;

use super::minhash::MinHashSignature;

/// Splits each signature into bands of consecutive permutation values;
/// two signatures sharing any one band's values land in the same bucket
/// and become a candidate pair, which is then verified against the exact
/// Jaccard threshold.
pub struct Lsh {
    bands: usize,
    rows: usize,
}

impl Lsh {
    pub fn new(num_permutations: usize, bands: usize) -> Self {
        let bands = bands.max(1);
        let rows = (num_permutations / bands).max(1);
        Self { bands, rows }
    }

    /// Returns `(id_a, id_b, estimated_jaccard)` for every candidate pair
    /// whose estimated similarity is at least `threshold`. Pairs are
    /// deduplicated; order within a pair is unspecified (the caller, S2's
    /// union-find merge, doesn't care).
    pub fn find_pairs(
        &self,
        signatures: &[(SectionId, MinHashSignature)],
        threshold: f32,
    ) -> Vec<(SectionId, SectionId, f32)> {
        let mut buckets: HashMap<(usize, Vec<u64>), Vec<usize>> = HashMap::new();

        for (idx, (_, sig)) in signatures.iter().enumerate() {
            for band in 0..self.bands {
                let start = band * self.rows;
                if start >= sig.0.len() {
                    break;
                }
                let end = (start + self.rows).min(sig.0.len());
                buckets
                    .entry((band, sig.0[start..end].to_vec()))
                    .or_default()
                    .push(idx);
            }
        }

        let mut seen_pairs: HashSet<(usize, usize)> = HashSet::new();
        let mut pairs = Vec::new();

        for indices in buckets.values() {
            if indices.len() < 2 {
                continue;
            }
            for i in 0..indices.len() {
                for j in (i + 1)..indices.len() {
                    let (a, b) = (indices[i], indices[j]);
                    let key = (a.min(b), a.max(b));
                    if !seen_pairs.insert(key) {
                        continue;
                    }
                    let sim = signatures[a].1.estimated_jaccard(&signatures[b].1);
                    if sim >= threshold {
                        pairs.push((signatures[a].0.clone(), signatures[b].0.clone(), sim));
                    }
                }
            }
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::minhash::MinHasher;

    #[test]
    fn finds_near_duplicate_pair() {
        let hasher = MinHasher::new(64);
        let signatures = vec![
            (
                SectionId::from("dc-1"),
                hasher.signature("the fee shall be five hundred dollars and due promptly"),
            ),
            (
                SectionId::from("dc-2"),
                hasher.signature("the fee shall be five hundred dollars and due promptly"),
            ),
            (
                SectionId::from("dc-3"),
                hasher.signature("definitions in this chapter mean whatever context requires"),
            ),
        ];

        let lsh = Lsh::new(64, 16);
        let pairs = lsh.find_pairs(&signatures, 0.95);
        assert_eq!(pairs.len(), 1);
        let (a, b, sim) = &pairs[0];
        let mut ids = [a.0.as_str(), b.0.as_str()];
        ids.sort();
        assert_eq!(ids, ["dc-1", "dc-2"]);
        assert!(*sim >= 0.95);
    }
}
