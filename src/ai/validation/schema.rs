//! Generic JSON Schema validation for structured LLM responses (spec §4.3).
//!
//! Every structured-output stage (S6/S8/S9/S10/S11) declares a JSON Schema
//! and validates the LLM's response against it before treating the
//! response as trustworthy. Unlike the per-field hand-rolled validators
//! this replaces, one validator serves every stage's schema.

use jsonschema::Validator;
use serde_json::Value;

use crate::types::{PipelineError, Result, ValidationError};

/// Compiles a JSON Schema once and validates candidate values against it.
pub struct SchemaValidator {
    compiled: Validator,
}

impl SchemaValidator {
    pub fn new(schema: &Value) -> Result<Self> {
        let compiled = jsonschema::validator_for(schema)
            .map_err(|e| PipelineError::Config(format!("invalid JSON schema: {}", e)))?;
        Ok(Self { compiled })
    }

    /// Validate `value`, collecting every schema violation rather than
    /// failing fast on the first one.
    pub fn validate(&self, value: &Value) -> std::result::Result<(), ValidationError> {
        let errors: Vec<String> = self
            .compiled
            .iter_errors(value)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::schema(errors.join("; ")))
        }
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        self.compiled.is_valid(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_conforming_value() {
        let schema = json!({
            "type": "object",
            "required": ["severity"],
            "properties": {"severity": {"type": "string"}}
        });
        let validator = SchemaValidator::new(&schema).unwrap();
        assert!(validator.is_valid(&json!({"severity": "high"})));
    }

    #[test]
    fn rejects_missing_required_field() {
        let schema = json!({
            "type": "object",
            "required": ["severity"],
            "properties": {"severity": {"type": "string"}}
        });
        let validator = SchemaValidator::new(&schema).unwrap();
        assert!(validator.validate(&json!({})).is_err());
    }
}
