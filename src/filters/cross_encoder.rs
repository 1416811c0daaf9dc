//! Cross-encoder pre-filter: scores a section against a fixed set of
//! positive-indicator sentences and keeps the max (S7, spec §4.6). Like
//! [`super::regex_filter`], this runs ahead of the LLM classification
//! stages it gates.

use crate::types::Section;

/// Positive-indicator sentences each candidate section is scored
/// against; the section's overall score is the max across all of them.
pub const REPORTING_INDICATORS: &[&str] = &[
    "This section imposes a strict compliance deadline.",
    "This section creates a financial penalty or fee.",
    "This section restricts or prohibits an action.",
    "This section allocates authority or responsibility to an agency.",
];

/// Scores a `(section_text, indicator)` pair for semantic relatedness.
/// The scoring model itself is an external collaborator (spec §1
/// non-goal); this crate only depends on the trait and the filtering
/// policy built on top of it.
pub trait CrossEncoder: Send + Sync {
    fn score(&self, section_text: &str, indicator: &str) -> f32;
}

/// Runs `encoder` over every [`REPORTING_INDICATORS`] sentence and keeps
/// the maximum score.
pub fn max_indicator_score(encoder: &dyn CrossEncoder, section: &Section) -> f32 {
    REPORTING_INDICATORS
        .iter()
        .map(|indicator| encoder.score(&section.text, indicator))
        .fold(f32::MIN, f32::max)
}

/// Whether `section` passes S7's pre-filter at `threshold`. The default
/// threshold (0.2) is deliberately low — the filter is meant to favor
/// false positives over dropping a section the LLM stage would have
/// caught (spec §4.6).
pub fn passes(encoder: &dyn CrossEncoder, section: &Section, threshold: f32) -> bool {
    max_indicator_score(encoder, section) >= threshold
}

/// Word-overlap scorer standing in for the NLI-trained cross-encoder
/// model spec §4.6 describes and spec §1 scopes out of this crate. Scores
/// a pair by the fraction of the indicator's words also present in the
/// section text — cheap, no network dependency, and conservative enough
/// to suit a pre-filter whose job is to favor false positives.
pub struct LexicalOverlapEncoder;

impl CrossEncoder for LexicalOverlapEncoder {
    fn score(&self, section_text: &str, indicator: &str) -> f32 {
        let section_words: std::collections::HashSet<&str> =
            section_text.split_whitespace().collect();
        let indicator_words: std::collections::HashSet<&str> =
            indicator.split_whitespace().collect();
        let overlap = section_words.intersection(&indicator_words).count();
        overlap as f32 / indicator_words.len().max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(text: &str) -> Section {
        Section {
            id: "dc-1".into(),
            jurisdiction: "dc".into(),
            citation: "§ 1".to_string(),
            heading: "h".to_string(),
            text: text.to_string(),
            ancestors: vec![],
        }
    }

    #[test]
    fn high_overlap_passes_threshold() {
        let encoder = LexicalOverlapEncoder;
        let s = section("This section imposes a strict compliance deadline for filing.");
        assert!(passes(&encoder, &s, 0.2));
    }

    #[test]
    fn low_overlap_fails_threshold() {
        let encoder = LexicalOverlapEncoder;
        let s = section("Definitions apply throughout this title.");
        assert!(!passes(&encoder, &s, 0.5));
    }
}
