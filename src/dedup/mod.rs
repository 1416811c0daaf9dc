//! Near-duplicate detection (S2, spec §4.4): MinHash signatures, LSH
//! candidate-pair search, and multi-resolution conservative merge into a
//! [`crate::types::DedupMap`].

mod lsh;
mod merge;
mod minhash;

pub use lsh::Lsh;
pub use merge::{detect_at_limit, merge_conservative};
pub use minhash::{MinHashSignature, MinHasher};

use crate::config::DedupConfig;
use crate::types::{DedupMap, Section};

/// Full S2 pipeline: detect at every configured truncation limit
/// (ascending) and merge conservatively, shortest limit winning ties.
pub fn run(sections: &[Section], config: &DedupConfig) -> DedupMap {
    let mut limits = config.truncation_limits.clone();
    limits.sort_unstable();

    let maps = limits
        .into_iter()
        .map(|limit| detect_at_limit(sections, config, limit))
        .collect();

    merge_conservative(maps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SectionId;

    #[test]
    fn run_merges_across_configured_limits() {
        let config = DedupConfig::default();
        let text = "the fee shall be five hundred dollars and due promptly within thirty days of notice to the responsible party per the schedule established by the agency".repeat(1);
        let sections = vec![
            Section {
                id: "dc-1".into(),
                jurisdiction: "dc".into(),
                citation: "§ 1".to_string(),
                heading: "h".to_string(),
                text: text.clone(),
                ancestors: vec![],
            },
            Section {
                id: "dc-2".into(),
                jurisdiction: "dc".into(),
                citation: "§ 2".to_string(),
                heading: "h".to_string(),
                text,
                ancestors: vec![],
            },
        ];
        let map = run(&sections, &config);
        assert_eq!(map.canonical(&SectionId::from("dc-2")), SectionId::from("dc-1"));
    }
}
