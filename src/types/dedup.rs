//! Dedup map type shared between S2 and its downstream consumers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::section::SectionId;

/// A function from section id to its canonical representative's id.
///
/// Invariant: no canonical id ever appears as a key (a canonical id always
/// maps to itself implicitly by absence, never via a self-referential entry).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupMap {
    map: HashMap<SectionId, SectionId>,
}

impl DedupMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `id` is a duplicate of `canonical`. No-op if `id ==
    /// canonical` (a section is always its own implicit canonical).
    pub fn insert(&mut self, id: SectionId, canonical: SectionId) {
        if id != canonical {
            self.map.insert(id, canonical);
        }
    }

    /// Resolve a section id to its canonical id, following exactly one hop
    /// (the map is maintained so that canonical ids are never themselves
    /// keys, so multi-hop resolution never arises in a correctly built map).
    pub fn canonical(&self, id: &SectionId) -> SectionId {
        self.map.get(id).cloned().unwrap_or_else(|| id.clone())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SectionId, &SectionId)> {
        self.map.iter()
    }

    /// True if every canonical id is absent as a key — the map's core
    /// invariant, checked by property tests over arbitrary construction.
    pub fn is_well_formed(&self) -> bool {
        self.map.values().all(|canon| !self.map.contains_key(canon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_id_is_its_own_canonical() {
        let map = DedupMap::new();
        let id: SectionId = "dc-1".into();
        assert_eq!(map.canonical(&id), id);
    }

    #[test]
    fn self_mapping_is_a_no_op() {
        let mut map = DedupMap::new();
        map.insert("dc-1".into(), "dc-1".into());
        assert!(map.is_empty());
    }

    #[test]
    fn well_formed_after_normal_inserts() {
        let mut map = DedupMap::new();
        map.insert("dc-2".into(), "dc-1".into());
        map.insert("dc-3".into(), "dc-1".into());
        assert!(map.is_well_formed());
        assert_eq!(map.canonical(&"dc-2".into()), SectionId::from("dc-1"));
    }
}
