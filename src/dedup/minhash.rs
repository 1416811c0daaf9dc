//! MinHash signatures over whitespace-tokenized section text (S2, spec §4.4).

/// A 61-bit Mersenne prime, used as the modulus for the permutation hash
/// family so collisions stay rare without needing 128-bit arithmetic.
const MERSENNE_PRIME: u64 = (1u64 << 61) - 1;

/// One section's MinHash signature: the minimum hash value seen per
/// permutation, over the section's token set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinHashSignature(pub Vec<u64>);

impl MinHashSignature {
    /// Fraction of permutations where the two signatures agree — an
    /// unbiased estimator of the Jaccard similarity of the underlying
    /// token sets.
    pub fn estimated_jaccard(&self, other: &MinHashSignature) -> f32 {
        if self.0.is_empty() {
            return 0.0;
        }
        let matches = self.0.iter().zip(&other.0).filter(|(a, b)| a == b).count();
        matches as f32 / self.0.len() as f32
    }
}

struct Permutation {
    a: u64,
    b: u64,
}

/// Builds MinHash signatures with a fixed, reproducible permutation
/// family so two runs over the same corpus produce identical signatures.
pub struct MinHasher {
    permutations: Vec<Permutation>,
}

impl MinHasher {
    pub fn new(num_permutations: usize) -> Self {
        let mut state = 0x9E3779B97F4A7C15u64;
        let permutations = (0..num_permutations.max(1))
            .map(|_| {
                state = splitmix64(state);
                let a = (state % (MERSENNE_PRIME - 1)) + 1;
                state = splitmix64(state);
                let b = state % MERSENNE_PRIME;
                Permutation { a, b }
            })
            .collect();
        Self { permutations }
    }

    /// Tokenize `text` (lowercased, split on whitespace) and compute its
    /// MinHash signature. Sections with no tokens get an all-zero
    /// signature, which never collides with a real one under these
    /// permutation coefficients in practice.
    pub fn signature(&self, text: &str) -> MinHashSignature {
        let tokens: Vec<u64> = text
            .split_whitespace()
            .map(|tok| fnv1a(tok.to_lowercase().as_bytes()))
            .collect();

        if tokens.is_empty() {
            return MinHashSignature(vec![0; self.permutations.len()]);
        }

        let signature = self
            .permutations
            .iter()
            .map(|perm| {
                tokens
                    .iter()
                    .map(|&h| perm.a.wrapping_mul(h).wrapping_add(perm.b) % MERSENNE_PRIME)
                    .min()
                    .unwrap_or(0)
            })
            .collect();
        MinHashSignature(signature)
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_jaccard_one() {
        let hasher = MinHasher::new(64);
        let a = hasher.signature("the fee shall be five hundred dollars");
        let b = hasher.signature("the fee shall be five hundred dollars");
        assert_eq!(a.estimated_jaccard(&b), 1.0);
    }

    #[test]
    fn unrelated_text_has_low_jaccard() {
        let hasher = MinHasher::new(128);
        let a = hasher.signature("the fee shall be five hundred dollars and due promptly");
        let b = hasher.signature("definitions in this chapter mean whatever the context requires");
        assert!(a.estimated_jaccard(&b) < 0.3);
    }

    #[test]
    fn is_case_insensitive() {
        let hasher = MinHasher::new(32);
        let a = hasher.signature("THE FEE SHALL BE PAID");
        let b = hasher.signature("the fee shall be paid");
        assert_eq!(a.estimated_jaccard(&b), 1.0);
    }
}
