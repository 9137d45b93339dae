//! In-memory registry used by engine tests
//!
//! Repositories are keyed by (registry, repository). Pushing copies the
//! source digest into the destination repository and moves the tag onto it,
//! which is what a real registry ends up with after a tag push.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use tagsync_image::{
    Digest, ImageHandle, ImageReference, ManifestBlob, ManifestIndex, Registry, RegistryError,
    RepositoryRef,
};

/// Registry operations, for call recording and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Exists,
    List,
    TagsFor,
    Pull,
    Push,
}

/// A recorded call: operation and the registry host it targeted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub registry: String,
    pub target: String,
}

struct Failure {
    op: Op,
    registry: String,
    error: RegistryError,
    remaining: Option<usize>,
}

#[derive(Default)]
struct State {
    repositories: HashMap<RepositoryRef, ManifestIndex>,
    calls: Vec<Call>,
    failures: Vec<Failure>,
    hidden: HashSet<ImageReference>,
}

#[derive(Default)]
pub struct FakeRegistry {
    state: Mutex<State>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `digest` in `repository` with `tags`
    pub fn with_image(self, repository: &RepositoryRef, hex: &str, tags: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .repositories
            .entry(repository.clone())
            .or_default()
            .insert(super::digest(hex), tags.iter().copied());
        self
    }

    /// Fail `op` against `registry`, `times` times or forever when `None`
    pub fn fail(&self, op: Op, registry: &str, error: RegistryError, times: Option<usize>) {
        self.state.lock().unwrap().failures.push(Failure {
            op,
            registry: registry.to_string(),
            error,
            remaining: times,
        });
    }

    /// Make existence checks for `image` answer false while listings still
    /// show it
    pub fn hide(&self, image: ImageReference) {
        self.state.lock().unwrap().hidden.insert(image);
    }

    /// Digest `tag` points at in `repository`
    pub fn tagged(&self, repository: &RepositoryRef, tag: &str) -> Option<Digest> {
        self.state
            .lock()
            .unwrap()
            .repositories
            .get(repository)
            .and_then(|index| index.tagged_digest(tag).cloned())
    }

    /// Copy of every stored repository, for before/after comparisons
    pub fn snapshot(&self) -> HashMap<RepositoryRef, ManifestIndex> {
        self.state.lock().unwrap().repositories.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls().iter().filter(|c| c.op == op).count()
    }

    pub fn count_on(&self, op: Op, registry: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.op == op && c.registry == registry)
            .count()
    }

    /// Record the call and return an injected failure, if any
    async fn enter(&self, op: Op, registry: &str, target: String) -> Result<(), RegistryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            op,
            registry: registry.to_string(),
            target,
        });

        let failure = state
            .failures
            .iter_mut()
            .find(|f| f.op == op && f.registry == registry && f.remaining != Some(0));

        match failure {
            Some(failure) => {
                if let Some(remaining) = failure.remaining.as_mut() {
                    *remaining -= 1;
                }
                Err(failure.error.clone())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn exists(&self, image: &ImageReference) -> Result<bool, RegistryError> {
        self.enter(Op::Exists, &image.registry, image.to_string()).await?;
        let digest = image.digest().expect("exists takes a digest reference");
        let state = self.state.lock().unwrap();
        if state.hidden.contains(image) {
            return Ok(false);
        }
        Ok(state
            .repositories
            .get(&image.repository_ref())
            .is_some_and(|index| index.contains(digest)))
    }

    async fn list_manifests(
        &self,
        repository: &RepositoryRef,
    ) -> Result<ManifestIndex, RegistryError> {
        self.enter(Op::List, &repository.registry, repository.to_string())
            .await?;
        let state = self.state.lock().unwrap();
        Ok(state
            .repositories
            .get(repository)
            .cloned()
            .unwrap_or_default())
    }

    async fn tags_for(&self, image: &ImageReference) -> Result<BTreeSet<String>, RegistryError> {
        self.enter(Op::TagsFor, &image.registry, image.to_string()).await?;
        let digest = image.digest().expect("tags_for takes a digest reference");
        let state = self.state.lock().unwrap();
        Ok(state
            .repositories
            .get(&image.repository_ref())
            .map(|index| index.tags_for(digest))
            .unwrap_or_default())
    }

    async fn pull(&self, image: &ImageReference) -> Result<ImageHandle, RegistryError> {
        self.enter(Op::Pull, &image.registry, image.to_string()).await?;
        let digest = image.digest().expect("pull takes a digest reference");

        let state = self.state.lock().unwrap();
        let present = state
            .repositories
            .get(&image.repository_ref())
            .is_some_and(|index| index.contains(digest));
        if !present {
            return Err(RegistryError::NotFound {
                reference: image.to_string(),
            });
        }

        Ok(ImageHandle::new(
            image.clone(),
            ManifestBlob {
                digest: digest.clone(),
                media_type: "application/vnd.oci.image.manifest.v1+json".to_string(),
                body: b"{}".to_vec(),
            },
        ))
    }

    async fn push(
        &self,
        destination: &ImageReference,
        image: &ImageHandle,
    ) -> Result<(), RegistryError> {
        self.enter(Op::Push, &destination.registry, destination.to_string())
            .await?;
        let tag = destination.tag().expect("push takes a tag reference");

        let mut state = self.state.lock().unwrap();
        let index = state
            .repositories
            .entry(destination.repository_ref())
            .or_default();
        index.insert(image.digest().clone(), Vec::<String>::new());
        index.move_tag(tag, image.digest());
        Ok(())
    }
}
