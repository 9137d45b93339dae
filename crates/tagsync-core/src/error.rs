//! Error types for tagsync-core

use thiserror::Error;

/// Result type alias using tagsync-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading and validating tag maps
#[derive(Error, Debug)]
pub enum Error {
    /// Tag map file not found
    #[error("Tag map not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid tag map content
    #[error("Invalid tag map: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Schema validation error
    #[error("Schema validation failed:\n{errors}")]
    SchemaValidation { errors: String },

    /// Integrity check error
    #[error("Integrity check failed:\n{errors}")]
    Integrity { errors: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a schema validation error from a list of errors
    pub fn schema_validation(errors: Vec<String>) -> Self {
        Self::SchemaValidation {
            errors: errors.join("\n"),
        }
    }

    /// Create an integrity error from a list of violations
    pub fn integrity(violations: Vec<String>) -> Self {
        Self::Integrity {
            errors: violations
                .iter()
                .map(|v| format!("  - {}", v))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}
