//! Builders for configuration values used by engine tests

use super::constants::*;
use tagsync_core::types::{ImageSpec, Project, ReconcileOptions, RetryPolicy, RetryStrategy};

/// Fluent builder for [`Project`]
pub struct ProjectBuilder {
    project: Project,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self {
            project: Project {
                base_registry: BASE_REGISTRY.to_string(),
                additional_registries: vec![],
                repository: REPOSITORY.to_string(),
                images: vec![],
            },
        }
    }

    pub fn base(mut self, registry: &str) -> Self {
        self.project.base_registry = registry.to_string();
        self
    }

    pub fn mirror(mut self, registry: &str) -> Self {
        self.project.additional_registries.push(registry.to_string());
        self
    }

    pub fn image(mut self, prefix: &str, tag: &str) -> Self {
        self.project.images.push(ImageSpec {
            digest_prefix: prefix.to_string(),
            tag: tag.to_string(),
        });
        self
    }

    pub fn build(self) -> Project {
        self.project
    }
}

impl Default for ProjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Options with fast retries and a short call timeout
pub fn test_options(dry_run: bool) -> ReconcileOptions {
    ReconcileOptions {
        dry_run,
        request_timeout_secs: 5,
        push_retry: RetryPolicy {
            max_attempts: 3,
            strategy: RetryStrategy::FixedDelay,
            backoff_multiplier: 1.0,
            initial_delay_ms: 1,
            max_delay_ms: 5,
        },
    }
}
