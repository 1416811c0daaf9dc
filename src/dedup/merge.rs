//! Multi-resolution near-duplicate detection and conservative map merge
//! (S2, spec §4.4).
//!
//! Detection runs once per configured truncation limit (shorter shingles
//! first), since two sections that diverge after a shared opening clause
//! are false positives at a long limit but correctly flagged at a short
//! one. Resolving that tie is Open Question #1: the shortest limit that
//! flagged a pair wins the merge, confirmed against
//! `00_deduplicate_sections.py`'s `merge_dedup_maps()`, which folds maps
//! in ascending limit order and lets the first writer to a key stand.

use std::collections::HashMap;

use crate::config::DedupConfig;
use crate::types::{DedupMap, Section, SectionId};

use super::lsh::Lsh;
use super::minhash::MinHasher;

/// Number of LSH bands; rows-per-band is derived from this and the
/// permutation count in [`Lsh::new`].
const LSH_BANDS: usize = 16;

/// Run MinHash/LSH detection over `sections` truncated to `limit` chars,
/// excluding sections shorter than `config.min_section_chars`. Returns a
/// map from each non-canonical section in a detected group to its
/// lexicographically smallest member.
pub fn detect_at_limit(sections: &[Section], config: &DedupConfig, limit: usize) -> DedupMap {
    let hasher = MinHasher::new(config.num_permutations);

    let signatures: Vec<(SectionId, _)> = sections
        .iter()
        .filter(|s| s.truncated_text(limit).chars().count() >= config.min_section_chars)
        .map(|s| (s.id.clone(), hasher.signature(s.truncated_text(limit))))
        .collect();

    let lsh = Lsh::new(config.num_permutations, LSH_BANDS);
    let pairs = lsh.find_pairs(&signatures, config.jaccard_threshold);

    group_into_map(pairs)
}

/// Union-find over candidate pairs; each connected group's canonical id
/// is its lexicographically smallest member.
fn group_into_map(pairs: Vec<(SectionId, SectionId, f32)>) -> DedupMap {
    let mut parent: HashMap<SectionId, SectionId> = HashMap::new();

    fn find(parent: &mut HashMap<SectionId, SectionId>, id: &SectionId) -> SectionId {
        let next = parent.get(id).cloned().unwrap_or_else(|| id.clone());
        if &next == id {
            return id.clone();
        }
        let root = find(parent, &next);
        parent.insert(id.clone(), root.clone());
        root
    }

    for (a, b, _) in &pairs {
        parent.entry(a.clone()).or_insert_with(|| a.clone());
        parent.entry(b.clone()).or_insert_with(|| b.clone());
        let root_a = find(&mut parent, a);
        let root_b = find(&mut parent, b);
        if root_a != root_b {
            let (lo, hi) = if root_a <= root_b {
                (root_a, root_b)
            } else {
                (root_b, root_a)
            };
            parent.insert(hi, lo);
        }
    }

    let mut map = DedupMap::new();
    let ids: Vec<SectionId> = parent.keys().cloned().collect();
    for id in ids {
        let canonical = find(&mut parent, &id);
        map.insert(id, canonical);
    }
    map
}

/// Merge maps produced at ascending truncation limits: the first
/// (shortest-limit) map to claim a section id wins, matching
/// `merge_dedup_maps()`'s first-writer-wins fold.
///
/// "Claim" covers both roles an id can take in the merged map: a section
/// already resolved as someone else's canonical is just as settled as one
/// already holding its own entry. Treating only keys as claimed would let
/// a later map re-key an id the earlier map had already used as a
/// canonical, producing a two-hop chain and breaking `DedupMap`'s
/// no-canonical-is-a-key invariant.
pub fn merge_conservative(maps_by_ascending_limit: Vec<DedupMap>) -> DedupMap {
    let mut merged = DedupMap::new();
    let mut claimed: std::collections::HashSet<SectionId> = std::collections::HashSet::new();

    for map in maps_by_ascending_limit {
        for (id, canonical) in map.iter() {
            if claimed.contains(id) {
                continue;
            }
            let target = if claimed.contains(canonical) {
                merged.canonical(canonical)
            } else {
                canonical.clone()
            };
            if target == *id {
                continue;
            }
            merged.insert(id.clone(), target.clone());
            claimed.insert(id.clone());
            claimed.insert(target);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, text: &str) -> Section {
        Section {
            id: id.into(),
            jurisdiction: "dc".into(),
            citation: "§ 1".to_string(),
            heading: "h".to_string(),
            text: text.to_string(),
            ancestors: vec![],
        }
    }

    #[test]
    fn shortest_limit_wins_on_conflicting_merges() {
        // At limit 5 both maps claim "b"; ascending order means the
        // limit-5 map wins even though the limit-10 map is processed
        // second with a different canonical.
        let mut short = DedupMap::new();
        short.insert(SectionId::from("b"), SectionId::from("a"));

        let mut long = DedupMap::new();
        long.insert(SectionId::from("b"), SectionId::from("z"));

        let merged = merge_conservative(vec![short, long]);
        assert_eq!(merged.canonical(&SectionId::from("b")), SectionId::from("a"));
    }

    #[test]
    fn later_map_cannot_rekey_an_already_claimed_canonical() {
        // limit-5 establishes b -> a (claiming both "a" and "b"). limit-10
        // separately tries to fold "a" itself into a "c" group; since "a"
        // is already claimed, that entry must be dropped rather than
        // accepted, or the merged map would have "a" as both a canonical
        // value (for b) and a key (for itself), breaking is_well_formed().
        let mut short = DedupMap::new();
        short.insert(SectionId::from("b"), SectionId::from("a"));

        let mut long = DedupMap::new();
        long.insert(SectionId::from("a"), SectionId::from("c"));

        let merged = merge_conservative(vec![short, long]);
        assert!(merged.is_well_formed());
        assert_eq!(merged.canonical(&SectionId::from("b")), SectionId::from("a"));
        assert_eq!(merged.canonical(&SectionId::from("a")), SectionId::from("a"));
    }

    #[test]
    fn detect_excludes_short_sections() {
        let config = DedupConfig {
            min_section_chars: 100,
            ..DedupConfig::default()
        };
        let sections = vec![
            section("dc-1", "short text"),
            section("dc-2", "short text"),
        ];
        let map = detect_at_limit(&sections, &config, 2000);
        assert!(map.is_empty());
    }

    #[test]
    fn detect_groups_near_identical_sections() {
        let config = DedupConfig::default();
        let long_text = "the fee shall be five hundred dollars and due promptly within thirty days of notice to the responsible party per the schedule established by the agency".to_string();
        let sections = vec![
            section("dc-2", &long_text),
            section("dc-1", &long_text),
            section("dc-3", "an entirely unrelated definition of terms used throughout this chapter and its subchapters"),
        ];
        let map = detect_at_limit(&sections, &config, 2000);
        assert_eq!(map.canonical(&SectionId::from("dc-2")), SectionId::from("dc-1"));
        assert!(map.is_well_formed());
    }
}
