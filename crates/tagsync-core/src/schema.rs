//! JSON Schema validation for tag maps

use crate::error::{Error, Result};
use jsonschema::Validator;
use serde_json::Value;
use tracing::debug;

/// Schema bundled with the binary
const TAG_CONFIG_SCHEMA: &str = include_str!("../../../schemas/tag-config.schema.json");

/// Validator compiled from the bundled tag map schema
#[derive(Debug)]
pub struct SchemaValidator {
    schema: Validator,
}

impl SchemaValidator {
    /// Compile the bundled schema
    pub fn new() -> Result<Self> {
        Self::from_json(TAG_CONFIG_SCHEMA)
    }

    /// Compile a schema from its JSON text
    pub fn from_json(schema: &str) -> Result<Self> {
        let schema_value: Value = serde_json::from_str(schema)?;
        let schema = jsonschema::validator_for(&schema_value)
            .map_err(|e| Error::invalid_config(format!("Failed to compile schema: {}", e)))?;

        debug!("Compiled tag map schema");
        Ok(Self { schema })
    }

    /// Validate a parsed document, collecting every violation
    pub fn validate(&self, value: &Value) -> Result<()> {
        let errors: Vec<String> = self
            .schema
            .iter_errors(value)
            .map(|e| {
                let path = e.instance_path().to_string();
                if path.is_empty() {
                    format!("  - {}", e)
                } else {
                    format!("  - {}: {}", path, e)
                }
            })
            .collect();

        if !errors.is_empty() {
            return Err(Error::schema_validation(errors));
        }

        Ok(())
    }
}
