//! AI Response Validation and Quality Assurance
//!
//! Validation layer for LLM responses ensuring:
//! - JSON repair for malformed responses
//! - Structural integrity against each stage's declared JSON Schema
//!
//! ## Design Philosophy
//! - Repair on format issues, fail on schema violations

mod json_repair;
mod schema;

pub use json_repair::{JsonRepairer, extract_json_from_response, extract_json_with_repair_status};
pub use schema::SchemaValidator;

use crate::types::{Result, ValidationError};
use serde_json::Value;

/// Unified validation pipeline: repair then validate against a schema.
pub struct ValidationPipeline {
    repairer: JsonRepairer,
    validator: SchemaValidator,
}

impl ValidationPipeline {
    /// Build a pipeline bound to one stage's declared JSON Schema.
    pub fn new(schema: &Value) -> Result<Self> {
        Ok(Self {
            repairer: JsonRepairer::new(),
            validator: SchemaValidator::new(schema)?,
        })
    }

    /// Process raw LLM response through full validation pipeline
    ///
    /// Steps:
    /// 1. Attempt JSON repair if malformed
    /// 2. Validate structure against the declared schema
    /// 3. Return the parsed response plus validation outcome
    pub fn process(&self, raw_response: &str) -> Result<ProcessedResponse> {
        let (value, was_repaired) = self.repairer.parse_or_repair(raw_response)?;
        let validation = self.validator.validate(&value);

        Ok(ProcessedResponse {
            value,
            was_repaired,
            validation,
        })
    }

    /// Quick validation check without JSON repair
    pub fn validate_only(&self, value: &Value) -> std::result::Result<(), ValidationError> {
        self.validator.validate(value)
    }
}

/// Result of full validation pipeline
#[derive(Debug)]
pub struct ProcessedResponse {
    /// Parsed (and possibly repaired) JSON value
    pub value: Value,
    /// Whether JSON repair was needed
    pub was_repaired: bool,
    /// Schema validation outcome
    pub validation: std::result::Result<(), ValidationError>,
}

impl ProcessedResponse {
    /// Check if response is usable (schema-valid)
    pub fn is_usable(&self) -> bool {
        self.validation.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn section_schema() -> Value {
        json!({
            "type": "object",
            "required": ["path", "sections"],
            "properties": {
                "path": {"type": "string"},
                "sections": {"type": "array"}
            }
        })
    }

    #[test]
    fn test_pipeline_valid_response() {
        let pipeline = ValidationPipeline::new(&section_schema()).unwrap();
        let valid_json = r#"{"path": "src/main.rs", "sections": []}"#;

        let result = pipeline.process(valid_json).unwrap();
        assert!(result.is_usable());
        assert!(!result.was_repaired);
    }

    #[test]
    fn test_pipeline_repairs_json() {
        let pipeline = ValidationPipeline::new(&section_schema()).unwrap();
        // Missing closing brace
        let malformed = r#"{"path": "test.rs", "sections": []"#;

        let result = pipeline.process(malformed).unwrap();
        assert!(result.was_repaired);
        assert!(result.is_usable());
    }

    #[test]
    fn test_pipeline_flags_schema_violation() {
        let pipeline = ValidationPipeline::new(&section_schema()).unwrap();
        let missing_field = r#"{"path": "test.rs"}"#;

        let result = pipeline.process(missing_field).unwrap();
        assert!(!result.is_usable());
    }
}
