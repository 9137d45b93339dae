use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Hex length of a sha256 digest
const SHA256_HEX_LEN: usize = 64;

/// A sha256 manifest digest, stored as 64 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    hex: String,
}

impl Digest {
    /// Hash algorithm label used in textual digests
    pub const ALGORITHM: &'static str = "sha256";

    /// Parse `sha256:<hex>` or bare `<hex>`
    pub fn parse(value: &str) -> Result<Self, RegistryError> {
        let hex = value
            .strip_prefix("sha256:")
            .unwrap_or(value)
            .to_ascii_lowercase();

        if hex.len() != SHA256_HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RegistryError::InvalidDigest {
                value: value.to_string(),
            });
        }

        Ok(Self { hex })
    }

    /// Hex part without the algorithm label
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Whether the hex part starts with `prefix` (case-insensitive)
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.hex.starts_with(&prefix.to_ascii_lowercase())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", Self::ALGORITHM, self.hex)
    }
}

impl TryFrom<String> for Digest {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.to_string()
    }
}

/// A repository on a specific registry host
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Registry hostname (e.g., "gcr.io", "localhost:5000")
    pub registry: String,
    /// Repository path (e.g., "google-appengine/python")
    pub repository: String,
}

impl RepositoryRef {
    pub fn new(registry: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
            repository: repository.into(),
        }
    }

    /// Digest-qualified reference inside this repository
    pub fn at_digest(&self, digest: &Digest) -> ImageReference {
        ImageReference {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            reference: Reference::Digest(digest.clone()),
        }
    }

    /// Tag-qualified reference inside this repository
    pub fn at_tag(&self, tag: impl Into<String>) -> ImageReference {
        ImageReference {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            reference: Reference::Tag(tag.into()),
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)
    }
}

/// Either an immutable digest or a mutable tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reference {
    Digest(Digest),
    Tag(String),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Digest(digest) => write!(f, "{}", digest),
            Reference::Tag(tag) => write!(f, "{}", tag),
        }
    }
}

/// Fully qualified image coordinate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    /// Registry hostname
    pub registry: String,
    /// Repository path
    pub repository: String,
    /// Digest or tag within the repository
    pub reference: Reference,
}

impl ImageReference {
    /// The repository this image lives in
    pub fn repository_ref(&self) -> RepositoryRef {
        RepositoryRef::new(self.registry.clone(), self.repository.clone())
    }

    /// The digest, when this is a digest-qualified reference
    pub fn digest(&self) -> Option<&Digest> {
        match &self.reference {
            Reference::Digest(digest) => Some(digest),
            Reference::Tag(_) => None,
        }
    }

    /// The tag, when this is a tag-qualified reference
    pub fn tag(&self) -> Option<&str> {
        match &self.reference {
            Reference::Tag(tag) => Some(tag),
            Reference::Digest(_) => None,
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            Reference::Digest(digest) => {
                write!(f, "{}/{}@{}", self.registry, self.repository, digest)
            }
            Reference::Tag(tag) => write!(f, "{}/{}:{}", self.registry, self.repository, tag),
        }
    }
}

/// Every manifest digest in a repository with the tags pointing at it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestIndex {
    entries: BTreeMap<Digest, BTreeSet<String>>,
}

impl ManifestIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `tags` for `digest`, merging with tags already known
    pub fn insert<I, S>(&mut self, digest: Digest, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries
            .entry(digest)
            .or_default()
            .extend(tags.into_iter().map(Into::into));
    }

    /// All digests present in the repository
    pub fn digests(&self) -> impl Iterator<Item = &Digest> {
        self.entries.keys()
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.entries.contains_key(digest)
    }

    /// Tags attached to `digest`
    pub fn tags_for(&self, digest: &Digest) -> BTreeSet<String> {
        self.entries.get(digest).cloned().unwrap_or_default()
    }

    /// Digest that `tag` currently points at
    pub fn tagged_digest(&self, tag: &str) -> Option<&Digest> {
        self.entries
            .iter()
            .find(|(_, tags)| tags.contains(tag))
            .map(|(digest, _)| digest)
    }

    /// Point `tag` at `digest`, detaching it from whatever it pointed at before
    pub fn move_tag(&mut self, tag: &str, digest: &Digest) {
        for tags in self.entries.values_mut() {
            tags.remove(tag);
        }
        self.entries
            .entry(digest.clone())
            .or_default()
            .insert(tag.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A manifest document fetched from a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestBlob {
    /// Digest of `body`
    pub digest: Digest,
    /// Value for the `Content-Type` header when pushing
    pub media_type: String,
    /// Raw manifest bytes, pushed verbatim so the digest is preserved
    pub body: Vec<u8>,
}

/// A layer or config blob referenced by a manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobDescriptor {
    /// Content digest (`<algorithm>:<hex>`)
    pub digest: String,
    /// Size in bytes
    pub size: u64,
}

/// Everything needed to recreate an image under a new name
///
/// Produced by [`crate::Registry::pull`] and consumed by
/// [`crate::Registry::push`]. Child manifests (for image indexes) are pushed by
/// digest before the root manifest is pushed under the destination tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle {
    /// Where the image was pulled from
    pub source: ImageReference,
    /// Manifest addressed by the source digest
    pub root: ManifestBlob,
    /// Platform manifests referenced by an index, in push order
    pub children: Vec<ManifestBlob>,
    /// Blobs referenced by the root and child manifests
    pub blobs: Vec<BlobDescriptor>,
}

impl ImageHandle {
    /// Handle for a single manifest without children or blobs
    pub fn new(source: ImageReference, root: ManifestBlob) -> Self {
        Self {
            source,
            root,
            children: Vec::new(),
            blobs: Vec::new(),
        }
    }

    /// Digest of the root manifest
    pub fn digest(&self) -> &Digest {
        &self.root.digest
    }
}
