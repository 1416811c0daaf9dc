//! Corpus section and structure types (spec §3).

use serde::{Deserialize, Serialize};

/// A jurisdiction tag, e.g. "dc", "ca". Opaque beyond comparison/display.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Jurisdiction(pub String);

impl std::fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Jurisdiction {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Stable identifier for a corpus section, unique within a jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SectionId(pub String);

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single section of corpus text, as emitted by S1's second pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub jurisdiction: Jurisdiction,
    pub citation: String,
    pub heading: String,
    pub text: String,
    /// Ids of ancestor `StructureNode`s, root first, resolved against the
    /// structure forest built in pass one.
    pub ancestors: Vec<String>,
}

impl Section {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Truncate text to at most `limit` chars, used by the multi-resolution
    /// dedup passes and the LLM-facing stages that bound prompt size.
    pub fn truncated_text(&self, limit: usize) -> &str {
        match self.text.char_indices().nth(limit) {
            Some((byte_idx, _)) => &self.text[..byte_idx],
            None => &self.text,
        }
    }
}

/// Node kind in the hierarchy forest built during S1's first pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    Title,
    Chapter,
    Subchapter,
    Part,
    Section,
}

/// A node in the title/chapter/subchapter hierarchy forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureNode {
    pub id: String,
    pub jurisdiction: Jurisdiction,
    pub kind: StructureKind,
    pub heading: String,
    pub parent_id: Option<String>,
    pub sequence: u32,
}

/// An extracted reference from one section to another (S3, regex-derived).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossReference {
    pub source_id: SectionId,
    pub target_citation: String,
    pub target_id: Option<SectionId>,
    pub context: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_text_respects_char_boundaries() {
        let section = Section {
            id: "dc-1".into(),
            jurisdiction: "dc".into(),
            citation: "§ 1-101".to_string(),
            heading: "Definitions".to_string(),
            text: "café".to_string(),
            ancestors: vec![],
        };
        assert_eq!(section.truncated_text(3), "caf");
        assert_eq!(section.truncated_text(100), "café");
    }

    #[test]
    fn char_len_counts_unicode_scalars_not_bytes() {
        let section = Section {
            id: "dc-2".into(),
            jurisdiction: "dc".into(),
            citation: "§ 1-102".to_string(),
            heading: "h".to_string(),
            text: "café".to_string(),
            ancestors: vec![],
        };
        assert_eq!(section.char_len(), 4);
    }
}
