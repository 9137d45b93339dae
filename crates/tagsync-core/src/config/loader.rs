//! Tag map file loading and parsing

use super::integrity::check_integrity;
use crate::error::{Error, Result};
use crate::schema::SchemaValidator;
use crate::types::{Project, TagConfigFile};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use std::fs;
use tracing::debug;

/// A loaded and validated tag map
#[derive(Debug, Clone)]
pub struct TagConfig {
    /// The parsed document
    pub file: TagConfigFile,

    /// Where the document was read from
    pub path: Utf8PathBuf,
}

impl TagConfig {
    /// Load and validate a tag map with the bundled schema
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let validator = SchemaValidator::new()?;
        Self::load_with(path, &validator)
    }

    /// Load and validate a tag map with an already compiled schema
    pub fn load_with(path: &Utf8Path, validator: &SchemaValidator) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config_not_found(path.as_str())
            } else {
                Error::Io(e)
            }
        })?;

        let file = Self::parse(&content, is_yaml(path), validator)?;
        debug!(
            "Loaded {} with {} project(s)",
            path,
            file.projects.len()
        );

        Ok(Self {
            file,
            path: path.to_owned(),
        })
    }

    /// Parse and validate tag map text
    pub fn parse(content: &str, yaml: bool, validator: &SchemaValidator) -> Result<TagConfigFile> {
        let value: Value = if yaml {
            serde_yaml_ng::from_str(content)?
        } else {
            serde_json::from_str(content)?
        };

        validator.validate(&value)?;

        let file: TagConfigFile = serde_json::from_value(value)?;

        let violations = check_integrity(&file);
        if !violations.is_empty() {
            return Err(Error::integrity(violations));
        }

        Ok(file)
    }

    /// Projects in document order
    pub fn projects(&self) -> &[Project] {
        &self.file.projects
    }

    /// Number of digest to tag mappings across all projects
    pub fn image_count(&self) -> usize {
        self.file.projects.iter().map(|p| p.images.len()).sum()
    }
}

fn is_yaml(path: &Utf8Path) -> bool {
    matches!(path.extension(), Some("yaml") | Some("yml"))
}
