//! LLM-derived analysis record types shared by S8/S10/S11 (spec §3).

use serde::{Deserialize, Serialize};

use super::section::SectionId;

/// A quoted span within a section's text supporting an indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Highlight {
    pub quote: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

/// One finding within a reporting/anachronism/implementation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicator {
    pub severity: String,
    pub complexity: Complexity,
    pub matched_phrases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    pub explanation: String,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingRecord {
    pub section_id: SectionId,
    pub indicators: Vec<Indicator>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnachronismAnalysis {
    pub section_id: SectionId,
    pub indicators: Vec<Indicator>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplementationAnalysis {
    pub section_id: SectionId,
    pub indicators: Vec<Indicator>,
}
