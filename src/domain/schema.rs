//! JSON Schema documents: compiling definitions and validating card content.
//!
//! Definitions and content arrive either as structured JSON or as a JSON
//! string holding the document text (the form older clients post). Both are
//! normalised to a [`Value`] before any check runs.

use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaDocumentError {
    #[error("`definition` cannot be empty")]
    EmptyDefinition,
    #[error("`definition` is not a valid JSON Schema: {0}")]
    Compile(String),
    #[error("content is not a structured JSON document: {0}")]
    MalformedContent(String),
    #[error("content violates the card schema ({} violations)", violations.len())]
    Violations { violations: Vec<String> },
}

impl SchemaDocumentError {
    /// Individual violation messages, empty for non-validation failures.
    pub fn violations(&self) -> &[String] {
        match self {
            Self::Violations { violations } => violations,
            _ => &[],
        }
    }
}

/// A definition that compiled successfully.
pub struct CompiledSchema {
    validator: Validator,
}

impl std::fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSchema").finish_non_exhaustive()
    }
}

impl CompiledSchema {
    /// Compile a definition, rejecting empty input and anything the JSON
    /// Schema meta-schema does not accept.
    pub fn compile(definition: &Value) -> Result<Self, SchemaDocumentError> {
        let definition = normalize_definition(definition)?;
        let validator = jsonschema::validator_for(&definition)
            .map_err(|err| SchemaDocumentError::Compile(err.to_string()))?;
        Ok(Self { validator })
    }

    /// Check normalised `content` against this schema, collecting every
    /// violation.
    pub fn validate(&self, content: &Value) -> Result<(), SchemaDocumentError> {
        let violations: Vec<String> = self
            .validator
            .iter_errors(content)
            .map(|err| err.to_string())
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaDocumentError::Violations { violations })
        }
    }
}

/// Validate `content` against a stored `definition` in one step.
pub fn validate_content(content: &Value, definition: &Value) -> Result<(), SchemaDocumentError> {
    let content = normalize_content(content)?;
    CompiledSchema::compile(definition)?.validate(&content)
}

/// Normalise a definition, returning the document that will be persisted.
/// Only object schemas are accepted; boolean schemas cannot carry a shape.
pub fn normalize_definition(definition: &Value) -> Result<Value, SchemaDocumentError> {
    let parsed = match definition {
        Value::Null => return Err(SchemaDocumentError::EmptyDefinition),
        Value::String(text) if text.trim().is_empty() => {
            return Err(SchemaDocumentError::EmptyDefinition);
        }
        Value::String(text) => serde_json::from_str(text)
            .map_err(|err| SchemaDocumentError::Compile(format!("invalid JSON: {err}")))?,
        other => other.clone(),
    };

    if parsed.is_object() {
        Ok(parsed)
    } else {
        Err(SchemaDocumentError::Compile(format!(
            "expected a JSON object, found {}",
            json_kind(&parsed)
        )))
    }
}

/// Normalise card content. Any JSON document is accepted; a string is
/// taken as document text and must parse.
pub fn normalize_content(content: &Value) -> Result<Value, SchemaDocumentError> {
    match content {
        Value::String(text) => serde_json::from_str(text)
            .map_err(|err| SchemaDocumentError::MalformedContent(err.to_string())),
        other => Ok(other.clone()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
