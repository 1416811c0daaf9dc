//! Regex pre-filter for monetary/temporal/penal/constraint language (S6,
//! spec §4.6). Runs ahead of the expensive LLM obligation-extraction
//! stage; a section that matches none of these patterns is skipped
//! entirely rather than sent to the cascade.

use regex::RegexSet;

use crate::types::Section;

pub struct RegexFilter {
    patterns: RegexSet,
}

impl RegexFilter {
    pub fn new() -> Self {
        let patterns = RegexSet::new([
            // Monetary
            r"(?i)\$\s?[\d,]+(\.\d{2})?",
            r"(?i)\bfee(s)?\b",
            r"(?i)\bfine(s)?\b",
            r"(?i)\bcents?\b",
            // Temporal / deadlines
            r"(?i)\bwithin\s+\d+\s+(day|days|month|months|year|years)\b",
            r"(?i)\bno later than\b",
            r"(?i)\bdeadline\b",
            // Penal
            r"(?i)\bimprison(ed|ment)?\b",
            r"(?i)\bmisdemeanor\b",
            r"(?i)\bfelony\b",
            r"(?i)\bpenalty\b",
            // Constraint / obligation language
            r"(?i)\bshall\s+not\b",
            r"(?i)\bmust\s+not\b",
            r"(?i)\bprohibited\b",
            r"(?i)\brequired to\b",
        ])
        .expect("static pattern set is valid");

        Self { patterns }
    }

    /// Whether any pattern matches the section's text.
    pub fn matches(&self, section: &Section) -> bool {
        self.patterns.is_match(&section.text)
    }
}

impl Default for RegexFilter {
    fn default() -> Self {
        Self::new()
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
    fn matches_monetary_language() {
        let filter = RegexFilter::new();
        assert!(filter.matches(&section("The fee shall be $500.")));
    }

    #[test]
    fn matches_temporal_language() {
        let filter = RegexFilter::new();
        assert!(filter.matches(&section("filed within 30 days")));
    }

    #[test]
    fn matches_penal_language() {
        let filter = RegexFilter::new();
        assert!(filter.matches(&section("punishable as a misdemeanor")));
    }

    #[test]
    fn rejects_unrelated_text() {
        let filter = RegexFilter::new();
        assert!(!filter.matches(&section("Definitions apply throughout this title.")));
    }
}
