//! Existence and tag inspection with a per-run cache

use crate::error::{ReconcileError, RegistryError};
use crate::registry::Registry;
use crate::types::{Digest, ImageReference, ManifestIndex, RepositoryRef};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// What a registry holds for one digest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inspection {
    /// Whether the digest exists in the repository
    pub exists: bool,
    /// Tags currently attached to the digest
    pub tags: BTreeSet<String>,
    /// Every digest of the repository with its tags
    pub manifests: ManifestIndex,
}

impl Inspection {
    /// An image that is not present; both collections are empty
    pub fn absent() -> Self {
        Self::default()
    }

    /// Digest `tag` points at in the inspected repository
    pub fn tagged_digest(&self, tag: &str) -> Option<&Digest> {
        self.manifests.tagged_digest(tag)
    }
}

/// Answers "does this image exist, and what is tagged where" for the engine
///
/// Existence is asked once per (registry, repository, digest) and each
/// repository is listed at most once. Tags written by the engine are folded
/// into the cached listings through [`Inspector::record_tag`].
pub struct Inspector<'a, R: ?Sized> {
    registry: &'a R,
    existence: HashMap<ImageReference, bool>,
    listings: HashMap<RepositoryRef, ManifestIndex>,
}

impl<'a, R: Registry + ?Sized> Inspector<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self {
            registry,
            existence: HashMap::new(),
            listings: HashMap::new(),
        }
    }

    /// Inspect a digest-qualified reference
    pub async fn inspect(&mut self, image: &ImageReference) -> Result<Inspection, ReconcileError> {
        let Some(digest) = image.digest().cloned() else {
            return Err(unavailable(
                image,
                "inspecting",
                RegistryError::InvalidDigest {
                    value: image.reference.to_string(),
                },
            ));
        };

        if !self.exists(image).await? {
            debug!("{} does not exist", image);
            return Ok(Inspection::absent());
        }

        let repository = image.repository_ref();
        let manifests = self.listing(&repository).await?.clone();

        Ok(Inspection {
            exists: true,
            tags: manifests.tags_for(&digest),
            manifests,
        })
    }

    /// Tags on `image` as currently known to this run, without a registry call
    pub fn known_tags(&self, image: &ImageReference) -> Option<BTreeSet<String>> {
        let digest = image.digest()?;
        self.listings
            .get(&image.repository_ref())
            .map(|index| index.tags_for(digest))
    }

    /// Fold a tag written (or simulated) by the engine into the cache
    pub async fn record_tag(&mut self, repository: &RepositoryRef, tag: &str, digest: &Digest) {
        self.existence.insert(repository.at_digest(digest), true);

        if !self.listings.contains_key(repository) {
            if let Err(e) = self.listing(repository).await {
                warn!("Could not refresh tags of {} after tagging: {}", repository, e);
                return;
            }
        }

        if let Some(index) = self.listings.get_mut(repository) {
            index.move_tag(tag, digest);
        }
    }

    async fn exists(&mut self, image: &ImageReference) -> Result<bool, ReconcileError> {
        if let Some(exists) = self.existence.get(image) {
            return Ok(*exists);
        }

        let exists = self
            .registry
            .exists(image)
            .await
            .map_err(|e| unavailable(image, "checking existence of", e))?;

        self.existence.insert(image.clone(), exists);
        Ok(exists)
    }

    async fn listing(&mut self, repository: &RepositoryRef) -> Result<&ManifestIndex, ReconcileError> {
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
            self.listings.insert(repository.clone(), index);
        }

        Ok(self.listings.entry(repository.clone()).or_default())
    }
}

fn unavailable(image: &ImageReference, operation: &str, err: RegistryError) -> ReconcileError {
    ReconcileError::RegistryUnavailable {
        registry: image.registry.clone(),
        operation: format!("{} {}", operation, image),
        reason: err.to_string(),
    }
}
