//! Corpus parsing (S1, spec §4.7/§3): a two-pass walk over a
//! jurisdiction's source documents that first builds the title/chapter
//! hierarchy forest, then resolves each section's ancestor chain against
//! it.
//!
//! The concrete source format (XML, HTML, whatever a jurisdiction
//! publishes in) is out of scope (spec §1 non-goal); this module defines
//! the two-pass *shape* every jurisdiction-specific parser must follow
//! and ships one in-memory reference implementation exercised by tests
//! and usable directly for corpora that are already structured data.

use crate::types::{Result, Section, StructureNode};

/// A source of raw corpus input for one jurisdiction. Pass one builds the
/// `StructureNode` forest; pass two resolves sections against it and
/// fills in `Section::ancestors`.
pub trait CorpusParser {
    /// Build the title/chapter/subchapter/part hierarchy forest.
    fn parse_structure(&self) -> Result<Vec<StructureNode>>;

    /// Parse sections and resolve each one's `ancestors` chain (root
    /// first) against the structure forest already built in pass one.
    fn parse_sections(&self, structure: &[StructureNode]) -> Result<Vec<Section>>;
}

/// Parses from a structure forest and a flat section list already held
/// in memory, resolving ancestors by walking `parent_id` links. Useful as
/// a reference implementation and for corpora fed in as pre-structured
/// data (e.g. from an upstream ETL step) rather than parsed from markup.
pub struct InMemoryCorpus {
    structure: Vec<StructureNode>,
    sections: Vec<(Section, Option<String>)>,
}

impl InMemoryCorpus {
    /// `sections` pairs each section with the id of its immediate parent
    /// `StructureNode`, or `None` for a top-level section.
    pub fn new(structure: Vec<StructureNode>, sections: Vec<(Section, Option<String>)>) -> Self {
        Self { structure, sections }
    }

    /// Walk `parent_id` links from `start` up to the root, returning ids
    /// root-first.
    fn ancestor_chain(structure: &[StructureNode], start: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = structure.iter().find(|n| n.id == start);
        while let Some(node) = current {
            chain.push(node.id.clone());
            current = node
                .parent_id
                .as_deref()
                .and_then(|parent_id| structure.iter().find(|n| n.id == parent_id));
        }
        chain.reverse();
        chain
    }
}

impl CorpusParser for InMemoryCorpus {
    fn parse_structure(&self) -> Result<Vec<StructureNode>> {
        Ok(self.structure.clone())
    }

    fn parse_sections(&self, structure: &[StructureNode]) -> Result<Vec<Section>> {
        Ok(self
            .sections
            .iter()
            .map(|(section, parent_id)| {
                let ancestors = match parent_id {
                    Some(id) => Self::ancestor_chain(structure, id),
                    None => Vec::new(),
                };
                Section {
                    ancestors,
                    ..section.clone()
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StructureKind;

    fn node(id: &str, parent: Option<&str>, sequence: u32) -> StructureNode {
        StructureNode {
            id: id.to_string(),
            jurisdiction: "dc".into(),
            kind: StructureKind::Chapter,
            heading: format!("heading-{id}"),
            parent_id: parent.map(|p| p.to_string()),
            sequence,
        }
    }

    fn section(id: &str) -> Section {
        Section {
            id: id.into(),
            jurisdiction: "dc".into(),
            citation: format!("§ {id}"),
            heading: "h".to_string(),
            text: "text".to_string(),
            ancestors: vec![],
        }
    }

    #[test]
    fn resolves_ancestor_chain_root_first() {
        let structure = vec![
            node("title-1", None, 0),
            node("chapter-1", Some("title-1"), 0),
            node("subchapter-1", Some("chapter-1"), 0),
        ];
        let sections = vec![(section("dc-1"), Some("subchapter-1".to_string()))];
        let corpus = InMemoryCorpus::new(structure.clone(), sections);

        let parsed_structure = corpus.parse_structure().unwrap();
        let parsed_sections = corpus.parse_sections(&parsed_structure).unwrap();

        assert_eq!(
            parsed_sections[0].ancestors,
            vec!["title-1".to_string(), "chapter-1".to_string(), "subchapter-1".to_string()]
        );
    }

    #[test]
    fn top_level_section_has_no_ancestors() {
        let structure = vec![node("title-1", None, 0)];
        let sections = vec![(section("dc-1"), None)];
        let corpus = InMemoryCorpus::new(structure.clone(), sections);

        let parsed_sections = corpus.parse_sections(&structure).unwrap();
        assert!(parsed_sections[0].ancestors.is_empty());
    }
}
