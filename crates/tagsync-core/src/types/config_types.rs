//! Tag map document types

use serde::{Deserialize, Serialize};

/// Label prefix some authors copy along with the digest
const DIGEST_ALGORITHM_LABEL: &str = "sha256:";

/// Root of a tag map document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagConfigFile {
    /// Projects to reconcile, in processing order
    pub projects: Vec<Project>,
}

/// A repository whose tags are kept in sync across registries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Registry that holds the authoritative digests (e.g. "gcr.io")
    pub base_registry: String,

    /// Mirrors that must carry the same tags
    #[serde(default)]
    pub additional_registries: Vec<String>,

    /// Repository path shared by every registry (e.g. "google-appengine/python")
    pub repository: String,

    /// Digest prefix to tag mappings
    #[serde(default)]
    pub images: Vec<ImageSpec>,
}

impl Project {
    /// Registries to visit for every image: mirrors first, base registry last.
    ///
    /// Duplicate mirrors are dropped, and the base registry is visited exactly
    /// once even when it is also listed as a mirror.
    pub fn effective_registries(&self) -> Vec<&str> {
        let mut registries: Vec<&str> = Vec::with_capacity(self.additional_registries.len() + 1);

        for registry in &self.additional_registries {
            let registry = registry.as_str();
            if registry != self.base_registry && !registries.contains(&registry) {
                registries.push(registry);
            }
        }

        registries.push(&self.base_registry);
        registries
    }
}

/// A single digest to tag mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    /// Leading hex characters of the image digest
    #[serde(rename = "digest")]
    pub digest_prefix: String,

    /// Tag that must point at the digest
    pub tag: String,
}

impl ImageSpec {
    /// Prefix with any `sha256:` label removed, lowercased for matching
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.digest_prefix.trim();
        trimmed
            .strip_prefix(DIGEST_ALGORITHM_LABEL)
            .unwrap_or(trimmed)
            .to_ascii_lowercase()
    }
}
