//! Prompt and schema wiring shared by the LLM-backed stages (S6, S8-S11):
//! builds each stage's declared JSON Schema (spec §4.3) and the prompt
//! sent alongside it, then parses the cascade's validated response back
//! into the stage's domain type.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::types::{
    Classification, ClassificationKind, Complexity, Highlight, Indicator, Obligation,
    ObligationCategory, ObligationValue, PipelineError, Result, Section, SectionId,
};

/// Schema for S6: an LLM-derived obligation list, the same shape S4's
/// regex pass produces but confidence-scored.
pub fn obligation_schema() -> Value {
    json!({
        "type": "object",
        "required": ["obligations"],
        "properties": {
            "obligations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["category", "description", "confidence"],
                    "properties": {
                        "category": {"enum": ["deadline", "constraint", "allocation", "penalty"]},
                        "description": {"type": "string"},
                        "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                        "days": {"type": "integer"},
                        "cents": {"type": "integer"}
                    }
                }
            }
        }
    })
}

pub fn obligation_prompt(section: &Section) -> String {
    format!(
        "Identify statutory obligations (deadline, constraint, allocation, or penalty) in the \
         following section. For each, give a category, a short description (5-200 chars), a \
         confidence between 0 and 1, and where applicable a \"days\" or \"cents\" value.\n\n\
         Section {}: {}\n\n{}",
        section.id,
        section.citation,
        section.truncated_text(3000)
    )
}

#[derive(Debug, Deserialize)]
struct LlmObligationItem {
    category: String,
    description: String,
    confidence: f32,
    #[serde(default)]
    days: Option<u32>,
    #[serde(default)]
    cents: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct LlmObligationsResponse {
    obligations: Vec<LlmObligationItem>,
}

pub fn parse_obligations(content: &Value, section_id: &SectionId) -> Result<Vec<Obligation>> {
    let parsed: LlmObligationsResponse = serde_json::from_value(content.clone())?;
    Ok(parsed
        .obligations
        .into_iter()
        .filter_map(|item| {
            let category = match item.category.as_str() {
                "deadline" => ObligationCategory::Deadline,
                "constraint" => ObligationCategory::Constraint,
                "allocation" => ObligationCategory::Allocation,
                "penalty" => ObligationCategory::Penalty,
                other => {
                    tracing::warn!(category = other, "dropping obligation with unknown category");
                    return None;
                }
            };
            let value = match (item.days, item.cents) {
                (Some(days), _) => Some(ObligationValue::Days { value: days }),
                (None, Some(cents)) => Some(ObligationValue::Cents { value: cents }),
                (None, None) => None,
            };
            Some(Obligation::llm_derived(
                section_id.clone(),
                category,
                item.description,
                value,
                item.confidence,
            ))
        })
        .collect())
}

/// Schema shared by S8 (reporting), S10 (anachronisms), S11
/// (implementation): all three produce the same indicator-list shape
/// over a single section (spec §3).
pub fn indicator_schema() -> Value {
    json!({
        "type": "object",
        "required": ["indicators"],
        "properties": {
            "indicators": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["severity", "complexity", "explanation"],
                    "properties": {
                        "severity": {"type": "string"},
                        "complexity": {"enum": ["low", "medium", "high"]},
                        "matched_phrases": {"type": "array", "items": {"type": "string"}},
                        "recommendation": {"type": "string"},
                        "explanation": {"type": "string"},
                        "highlights": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["quote"],
                                "properties": {
                                    "quote": {"type": "string"},
                                    "start": {"type": "integer"},
                                    "end": {"type": "integer"}
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}

pub fn reporting_prompt(section: &Section) -> String {
    format!(
        "Does this section impose a reporting obligation (a duty to report, file, notify, or \
         disclose to an authority)? List each such indicator with its severity, complexity, the \
         phrases that triggered it, an explanation, and supporting quotes.\n\nSection {}: {}\n\n{}",
        section.id,
        section.citation,
        section.truncated_text(3000)
    )
}

pub fn anachronism_prompt(section: &Section) -> String {
    format!(
        "Does this section reference an obsolete institution, technology, unit, or procedure no \
         longer in current use? List each such indicator with its severity, complexity, matched \
         phrases, an explanation, and supporting quotes.\n\nSection {}: {}\n\n{}",
        section.id,
        section.citation,
        section.truncated_text(3000)
    )
}

pub fn implementation_prompt(section: &Section) -> String {
    format!(
        "Does this section require implementing regulations, a rulemaking, or agency guidance \
         that may not yet exist? List each such indicator with its severity, complexity, matched \
         phrases, an explanation, and supporting quotes.\n\nSection {}: {}\n\n{}",
        section.id,
        section.citation,
        section.truncated_text(3000)
    )
}

#[derive(Debug, Deserialize)]
struct LlmHighlight {
    quote: String,
    #[serde(default)]
    start: Option<u32>,
    #[serde(default)]
    end: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LlmIndicator {
    severity: String,
    complexity: String,
    #[serde(default)]
    matched_phrases: Vec<String>,
    #[serde(default)]
    recommendation: Option<String>,
    explanation: String,
    #[serde(default)]
    highlights: Vec<LlmHighlight>,
}

#[derive(Debug, Deserialize)]
struct LlmIndicatorResponse {
    indicators: Vec<LlmIndicator>,
}

pub fn parse_indicators(content: &Value) -> Result<Vec<Indicator>> {
    let parsed: LlmIndicatorResponse = serde_json::from_value(content.clone())?;
    parsed
        .indicators
        .into_iter()
        .map(|item| {
            let complexity = match item.complexity.as_str() {
                "low" => Complexity::Low,
                "medium" => Complexity::Medium,
                "high" => Complexity::High,
                other => {
                    return Err(PipelineError::Parse {
                        message: format!("unknown complexity value: {other}"),
                        path: String::new(),
                    });
                }
            };
            Ok(Indicator {
                severity: item.severity,
                complexity,
                matched_phrases: item.matched_phrases,
                recommendation: item.recommendation,
                explanation: item.explanation,
                highlights: item
                    .highlights
                    .into_iter()
                    .map(|h| Highlight {
                        quote: h.quote,
                        start: h.start,
                        end: h.end,
                    })
                    .collect(),
            })
        })
        .collect()
}

/// Schema for S9: a judgement over one similarity pair.
pub fn classification_schema() -> Value {
    json!({
        "type": "object",
        "required": ["kind", "explanation", "confidence"],
        "properties": {
            "kind": {"enum": ["duplicate", "superseded", "related", "conflicting"]},
            "explanation": {"type": "string"},
            "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0}
        }
    })
}

pub fn classification_prompt(section_a: &Section, section_b: &Section, score: f32) -> String {
    format!(
        "Two sections were found similar (cosine score {score:.3}). Classify their relationship \
         as one of duplicate, superseded, related, or conflicting, and explain briefly.\n\n\
         Section {}: {}\n\nSection {}: {}",
        section_a.id,
        section_a.truncated_text(2000),
        section_b.id,
        section_b.truncated_text(2000),
    )
}

#[derive(Debug, Deserialize)]
struct LlmClassification {
    kind: String,
    explanation: String,
    confidence: f32,
}

pub fn parse_classification(
    content: &Value,
    section_a: SectionId,
    section_b: SectionId,
) -> Result<Classification> {
    let parsed: LlmClassification = serde_json::from_value(content.clone())?;
    let kind = match parsed.kind.as_str() {
        "duplicate" => ClassificationKind::Duplicate,
        "superseded" => ClassificationKind::Superseded,
        "related" => ClassificationKind::Related,
        "conflicting" => ClassificationKind::Conflicting,
        other => {
            return Err(PipelineError::Parse {
                message: format!("unknown classification kind: {other}"),
                path: String::new(),
            });
        }
    };
    Ok(Classification {
        section_a,
        section_b,
        kind,
        explanation: parsed.explanation,
        confidence: parsed.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, text: &str) -> Section {
        Section {
            id: id.into(),
            jurisdiction: "dc".into(),
            citation: format!("§ {id}"),
            heading: "h".to_string(),
            text: text.to_string(),
            ancestors: vec![],
        }
    }

    #[test]
    fn parses_llm_obligations_with_days_value() {
        let content = json!({
            "obligations": [
                {"category": "deadline", "description": "must file within 30 days", "confidence": 0.9, "days": 30}
            ]
        });
        let parsed = parse_obligations(&content, &SectionId::from("dc-1")).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].value, Some(ObligationValue::Days { value: 30 }));
        assert_eq!(parsed[0].confidence, Some(0.9));
    }

    #[test]
    fn drops_obligation_with_unknown_category() {
        let content = json!({
            "obligations": [{"category": "bogus", "description": "x", "confidence": 0.5}]
        });
        let parsed = parse_obligations(&content, &SectionId::from("dc-1")).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn parses_indicator_list() {
        let content = json!({
            "indicators": [{
                "severity": "high",
                "complexity": "medium",
                "matched_phrases": ["shall report"],
                "explanation": "requires notifying the agency",
                "highlights": [{"quote": "shall report within 10 days"}]
            }]
        });
        let indicators = parse_indicators(&content).unwrap();
        assert_eq!(indicators.len(), 1);
        assert_eq!(indicators[0].complexity, Complexity::Medium);
        assert_eq!(indicators[0].highlights.len(), 1);
    }

    #[test]
    fn parses_classification() {
        let content = json!({"kind": "duplicate", "explanation": "same text", "confidence": 0.95});
        let classification =
            parse_classification(&content, SectionId::from("dc-1"), SectionId::from("dc-2")).unwrap();
        assert_eq!(classification.kind, ClassificationKind::Duplicate);
    }

    #[test]
    fn builds_nonempty_prompts() {
        let section = section("dc-1", "must report within 10 days");
        assert!(obligation_prompt(&section).contains("dc-1"));
        assert!(reporting_prompt(&section).contains("reporting"));
    }
}
