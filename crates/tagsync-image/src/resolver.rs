//! Digest prefix resolution

use crate::error::ReconcileError;
use crate::registry::Registry;
use crate::types::{Digest, ManifestIndex, RepositoryRef};
use std::collections::HashMap;
use tracing::debug;

/// Resolves configured digest prefixes against a base repository
///
/// The digest list of each repository is fetched once per run; pushing tags
/// never adds or removes digests in the base repository, so the cached list
/// stays valid for the whole pass.
pub struct DigestResolver<'a, R: ?Sized> {
    registry: &'a R,
    listings: HashMap<RepositoryRef, Vec<Digest>>,
}

impl<'a, R: Registry + ?Sized> DigestResolver<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self {
            registry,
            listings: HashMap::new(),
        }
    }

    /// Resolve `prefix` to the unique digest in `repository` whose hex starts
    /// with it
    pub async fn resolve(
        &mut self,
        repository: &RepositoryRef,
        prefix: &str,
    ) -> Result<Digest, ReconcileError> {
        if !self.listings.contains_key(repository) {
            let index = self
                .registry
                .list_manifests(repository)
                .await
                .map_err(|e| ReconcileError::RegistryUnavailable {
                    registry: repository.registry.clone(),
                    operation: format!("listing manifests of {}", repository),
                    reason: e.to_string(),
                })?;

            debug!("{} has {} manifests", repository, index.len());
            self.listings
                .insert(repository.clone(), index.digests().cloned().collect());
        }

        let digests = self.listings.get(repository).map(Vec::as_slice).unwrap_or_default();
        match_prefix(digests.iter(), repository, prefix)
    }
}

/// Pick the single digest matching `prefix` from a repository's digests
pub fn match_prefix<'d>(
    digests: impl IntoIterator<Item = &'d Digest>,
    repository: &RepositoryRef,
    prefix: &str,
) -> Result<Digest, ReconcileError> {
    let prefix = prefix
        .trim()
        .strip_prefix("sha256:")
        .unwrap_or(prefix.trim())
        .to_ascii_lowercase();

    let not_found = || ReconcileError::PrefixNotFound {
        repository: repository.to_string(),
        prefix: prefix.clone(),
    };

    if prefix.is_empty() {
        return Err(not_found());
    }

    let matches: Vec<&Digest> = digests
        .into_iter()
        .filter(|digest| digest.matches_prefix(&prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(not_found()),
        [digest] => Ok((*digest).clone()),
        _ => Err(ReconcileError::AmbiguousPrefix {
            repository: repository.to_string(),
            prefix: prefix.clone(),
            matches: matches.len(),
        }),
    }
}

/// Convenience for callers holding a full index
pub fn resolve_in(
    index: &ManifestIndex,
    repository: &RepositoryRef,
    prefix: &str,
) -> Result<Digest, ReconcileError> {
    match_prefix(index.digests(), repository, prefix)
}
