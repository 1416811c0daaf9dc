//! Semantic similarity and classification types (spec §3, S5/S9).

use serde::{Deserialize, Serialize};

use super::section::SectionId;

/// A symmetric pair of similar sections with a similarity score.
///
/// The constructor always assigns the lexicographically smaller id to
/// `section_a`, so a reversed `(b, a)` pair can never be constructed —
/// this resolves the spec's fourth open question (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityPair {
    pub section_a: SectionId,
    pub section_b: SectionId,
    pub score: f32,
}

impl SimilarityPair {
    pub fn new(a: SectionId, b: SectionId, score: f32) -> Self {
        if a <= b {
            Self {
                section_a: a,
                section_b: b,
                score,
            }
        } else {
            Self {
                section_a: b,
                section_b: a,
                score,
            }
        }
    }
}

/// The relationship kind an LLM assigns to a similarity pair (S9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationKind {
    Duplicate,
    Superseded,
    Related,
    Conflicting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub section_a: SectionId,
    pub section_b: SectionId,
    pub kind: ClassificationKind,
    pub explanation: String,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_always_sorts_ids() {
        let pair = SimilarityPair::new("dc-9".into(), "dc-1".into(), 0.9);
        assert_eq!(pair.section_a, SectionId::from("dc-1"));
        assert_eq!(pair.section_b, SectionId::from("dc-9"));

        let already_sorted = SimilarityPair::new("dc-1".into(), "dc-9".into(), 0.9);
        assert_eq!(already_sorted.section_a, SectionId::from("dc-1"));
        assert_eq!(already_sorted.section_b, SectionId::from("dc-9"));
    }

    #[test]
    fn equal_ids_are_accepted_without_panicking() {
        let pair = SimilarityPair::new("dc-1".into(), "dc-1".into(), 1.0);
        assert_eq!(pair.section_a, pair.section_b);
    }
}
