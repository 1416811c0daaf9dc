//! Regex-based structured extraction (S3 cross-references, S4
//! obligations). Both stages are a single disjunction of compiled
//! patterns run once per section; no LLM is involved.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::{CrossReference, Obligation, ObligationCategory, ObligationValue, Section};

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:§+\s*|\bsection\s+)([0-9]+[A-Za-z]?(?:[.\-][0-9A-Za-z]+)*)").unwrap()
});

/// Finds citation-shaped substrings in `section.text` and emits one
/// [`CrossReference`] per match, skipping a match that is simply the
/// section's own citation (self-references are not cross-references).
pub fn extract_references(section: &Section) -> Vec<CrossReference> {
    CITATION_RE
        .captures_iter(&section.text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let target_citation = whole.as_str().trim().to_string();
            if section.citation.contains(&target_citation) {
                return None;
            }
            let start = whole.start().saturating_sub(30);
            let end = (whole.end() + 30).min(section.text.len());
            let context = char_safe_slice(&section.text, start, end).trim().to_string();

            Some(CrossReference {
                source_id: section.id.clone(),
                target_citation,
                target_id: None,
                context,
            })
        })
        .collect()
}

static DEADLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)within\s+(\d+)\s+(day|days|month|months|year|years)").unwrap()
});

static MONETARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s?([\d,]+(?:\.\d{2})?)").unwrap()
});

static PENALTY_CONTEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)fine|penalty|fee|imprison").unwrap());

static CONSTRAINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)shall\s+not|must\s+not|prohibited|required\s+to").unwrap());

/// Extracts deadline, penalty/allocation (monetary), and constraint
/// obligations from a section's plain text via pattern matching (spec
/// §4.6: "a disjunction of patterns for monetary, temporal, penal and
/// constraint language").
pub fn extract_obligations(section: &Section) -> Vec<Obligation> {
    let mut obligations = Vec::new();

    for caps in DEADLINE_RE.captures_iter(&section.text) {
        let whole = caps.get(0).unwrap();
        let Ok(count) = caps[1].parse::<u32>() else {
            continue;
        };
        let days = to_days(count, &caps[2]);
        let description = clamp_description(whole.as_str());
        obligations.push(Obligation::regex_derived(
            section.id.clone(),
            ObligationCategory::Deadline,
            description,
            Some(ObligationValue::Days { value: days }),
        ));
    }

    for caps in MONETARY_RE.captures_iter(&section.text) {
        let whole = caps.get(0).unwrap();
        let Some(cents) = parse_cents(&caps[1]) else {
            continue;
        };
        let category = if PENALTY_CONTEXT_RE.is_match(nearby(&section.text, whole.start(), whole.end())) {
            ObligationCategory::Penalty
        } else {
            ObligationCategory::Allocation
        };
        let description = clamp_description(nearby(&section.text, whole.start(), whole.end()));
        obligations.push(Obligation::regex_derived(
            section.id.clone(),
            category,
            description,
            Some(ObligationValue::Cents { value: cents }),
        ));
    }

    for mat in CONSTRAINT_RE.find_iter(&section.text) {
        let description = clamp_description(nearby(&section.text, mat.start(), mat.end()));
        obligations.push(Obligation::regex_derived(
            section.id.clone(),
            ObligationCategory::Constraint,
            description,
            None,
        ));
    }

    obligations
}

fn to_days(count: u32, unit: &str) -> u32 {
    match unit.to_lowercase().trim_end_matches('s') {
        "month" => count.saturating_mul(30),
        "year" => count.saturating_mul(365),
        _ => count,
    }
}

fn parse_cents(amount: &str) -> Option<i64> {
    let cleaned: String = amount.chars().filter(|c| *c != ',').collect();
    let dollars: f64 = cleaned.parse().ok()?;
    Some((dollars * 100.0).round() as i64)
}

fn nearby(text: &str, start: usize, end: usize) -> &str {
    let from = start.saturating_sub(40);
    let to = (end + 40).min(text.len());
    char_safe_slice(text, from, to)
}

fn char_safe_slice(text: &str, mut from: usize, mut to: usize) -> &str {
    while from > 0 && !text.is_char_boundary(from) {
        from -= 1;
    }
    while to < text.len() && !text.is_char_boundary(to) {
        to += 1;
    }
    &text[from..to]
}

/// Obligation descriptions are invariant-bound to [5, 200] chars (spec
/// §3); regex matches with surrounding context can run long.
fn clamp_description(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(200) {
        Some((byte_idx, _)) => trimmed[..byte_idx].to_string(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(text: &str) -> Section {
        Section {
            id: "dc-1".into(),
            jurisdiction: "dc".into(),
            citation: "§ 1-101".to_string(),
            heading: "h".to_string(),
            text: text.to_string(),
            ancestors: vec![],
        }
    }

    #[test]
    fn extracts_cross_reference_citation() {
        let refs = extract_references(&section("See § 2-202 for the general rule."));
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target_citation, "§ 2-202");
    }

    #[test]
    fn skips_self_citation() {
        let refs = extract_references(&section("As provided in § 1-101 above."));
        assert!(refs.is_empty());
    }

    #[test]
    fn extracts_deadline_in_days() {
        let obligations = extract_obligations(&section("must file within 30 days of notice."));
        let deadline = obligations
            .iter()
            .find(|o| o.category == ObligationCategory::Deadline)
            .unwrap();
        assert_eq!(deadline.value, Some(ObligationValue::Days { value: 30 }));
    }

    #[test]
    fn extracts_deadline_in_months_converted_to_days() {
        let obligations = extract_obligations(&section("must respond within 2 months."));
        let deadline = obligations
            .iter()
            .find(|o| o.category == ObligationCategory::Deadline)
            .unwrap();
        assert_eq!(deadline.value, Some(ObligationValue::Days { value: 60 }));
    }

    #[test]
    fn classifies_monetary_amount_as_penalty_near_fine_language() {
        let obligations = extract_obligations(&section("subject to a fine of $500.00 for each violation."));
        let penalty = obligations
            .iter()
            .find(|o| o.category == ObligationCategory::Penalty)
            .unwrap();
        assert_eq!(penalty.value, Some(ObligationValue::Cents { value: 50_000 }));
    }

    #[test]
    fn classifies_monetary_amount_as_allocation_without_penal_language() {
        let obligations = extract_obligations(&section("an annual budget of $1,000 is appropriated."));
        let allocation = obligations
            .iter()
            .find(|o| o.category == ObligationCategory::Allocation)
            .unwrap();
        assert_eq!(allocation.value, Some(ObligationValue::Cents { value: 100_000 }));
    }

    #[test]
    fn extracts_constraint_language() {
        let obligations = extract_obligations(&section("a licensee shall not operate without approval."));
        assert!(obligations.iter().any(|o| o.category == ObligationCategory::Constraint));
    }
}
