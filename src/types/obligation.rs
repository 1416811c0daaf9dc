//! Obligation extraction types (spec §3, S4/S6).

use serde::{Deserialize, Serialize};

use super::section::SectionId;

/// Obligation category, a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationCategory {
    Deadline,
    Constraint,
    Allocation,
    Penalty,
}

/// The concrete value/unit pair an obligation carries.
///
/// `Deadline` obligations always carry `Days`; `Allocation`/`Penalty`
/// obligations always carry `Cents` — `Constraint` obligations carry neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum ObligationValue {
    Days { value: u32 },
    Cents { value: i64 },
}

/// A single obligation extracted from a section, either by regex (S4) or
/// LLM (S6). `confidence` is only populated for LLM-derived obligations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obligation {
    pub section_id: SectionId,
    pub category: ObligationCategory,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ObligationValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Obligation {
    pub fn regex_derived(
        section_id: SectionId,
        category: ObligationCategory,
        description: impl Into<String>,
        value: Option<ObligationValue>,
    ) -> Self {
        Self {
            section_id,
            category,
            description: description.into(),
            value,
            confidence: None,
        }
    }

    pub fn llm_derived(
        section_id: SectionId,
        category: ObligationCategory,
        description: impl Into<String>,
        value: Option<ObligationValue>,
        confidence: f32,
    ) -> Self {
        Self {
            section_id,
            category,
            description: description.into(),
            value,
            confidence: Some(confidence),
        }
    }

    pub fn is_llm_derived(&self) -> bool {
        self.confidence.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_derived_has_no_confidence() {
        let ob = Obligation::regex_derived(
            "dc-1".into(),
            ObligationCategory::Deadline,
            "file within 30 days",
            Some(ObligationValue::Days { value: 30 }),
        );
        assert!(!ob.is_llm_derived());
    }

    #[test]
    fn llm_derived_carries_confidence() {
        let ob = Obligation::llm_derived(
            "dc-1".into(),
            ObligationCategory::Penalty,
            "fine not to exceed $500",
            Some(ObligationValue::Cents { value: 50_000 }),
            0.82,
        );
        assert!(ob.is_llm_derived());
        assert_eq!(ob.confidence, Some(0.82));
    }
}
