//! JSON Schema validation of the library document
//!
//! The schema file is a fixed contract shipped next to `library.json`. A
//! missing or broken schema is a configuration problem, reported separately
//! from a document that doesn't conform.

use crate::error::{LoadError, Result};
use jsonschema::Validator;
use serde_json::Value;
use std::path::Path;

/// Schema file used when none is configured
pub const DEFAULT_SCHEMA_PATH: &str = "library.schema.json";

/// Compiled library schema
pub struct SchemaValidator {
    validator: Validator,
}

impl SchemaValidator {
    /// Load and compile the schema at `path`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoadError::Configuration(format!(
                "the schema file {} was not found",
                path.display()
            )),
            _ => LoadError::Configuration(format!(
                "could not read schema file {}: {e}",
                path.display()
            )),
        })?;

        let schema: Value = serde_json::from_str(&text).map_err(|e| {
            LoadError::Configuration(format!("invalid JSON in the schema file: {e}"))
        })?;

        Self::from_value(&schema)
    }

    /// Compile an already parsed schema
    pub fn from_value(schema: &Value) -> Result<Self> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| LoadError::Configuration(format!("invalid schema: {e}")))?;

        Ok(Self { validator })
    }

    /// Validate the whole document, stopping at the first violation
    pub fn validate(&self, document: &Value) -> Result<()> {
        match self.validator.iter_errors(document).next() {
            Some(e) => Err(LoadError::Validation {
                path: e.instance_path.to_string(),
                message: e.to_string(),
            }),
            None => Ok(()),
        }
    }
}
