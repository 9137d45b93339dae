//! Semantic checks that a schema cannot express

use crate::types::TagConfigFile;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;

/// OCI distribution tag grammar
static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._-]{0,127}$").expect("tag pattern is a valid regex")
});

/// Length of a sha256 digest in hex characters
const DIGEST_HEX_LEN: usize = 64;

/// Check a parsed tag map, returning one message per violation.
///
/// Mapping the same tag to the same prefix twice is tolerated with a warning;
/// mapping it to two different prefixes is a violation since the result would
/// depend on processing order.
pub fn check_integrity(file: &TagConfigFile) -> Vec<String> {
    let mut violations = Vec::new();

    for (p_idx, project) in file.projects.iter().enumerate() {
        let location = format!("projects[{}] ({})", p_idx, project.repository);

        if project.base_registry.trim().is_empty() {
            violations.push(format!("{}: base_registry is empty", location));
        }
        if project.repository.trim().is_empty() {
            violations.push(format!("{}: repository is empty", location));
        }
        for registry in &project.additional_registries {
            if registry.trim().is_empty() {
                violations.push(format!("{}: additional_registries has an empty entry", location));
            }
        }

        let mut seen_tags: HashMap<&str, String> = HashMap::new();

        for (i_idx, image) in project.images.iter().enumerate() {
            let image_location = format!("{}.images[{}]", location, i_idx);
            let prefix = image.normalized_prefix();

            if prefix.is_empty() {
                violations.push(format!("{}: digest prefix is empty", image_location));
            } else if !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
                violations.push(format!(
                    "{}: digest prefix '{}' is not hexadecimal",
                    image_location, image.digest_prefix
                ));
            } else if prefix.len() > DIGEST_HEX_LEN {
                violations.push(format!(
                    "{}: digest prefix '{}' is longer than a sha256 digest",
                    image_location, image.digest_prefix
                ));
            }

            if !TAG_PATTERN.is_match(&image.tag) {
                violations.push(format!(
                    "{}: '{}' is not a valid tag",
                    image_location, image.tag
                ));
            }

            match seen_tags.get(image.tag.as_str()) {
                Some(previous) if *previous != prefix => violations.push(format!(
                    "{}: tag '{}' is mapped to both '{}' and '{}'",
                    image_location, image.tag, previous, prefix
                )),
                Some(_) => warn!(
                    "{}: tag '{}' is listed more than once",
                    image_location, image.tag
                ),
                None => {
                    seen_tags.insert(&image.tag, prefix);
                }
            }
        }
    }

    violations
}
