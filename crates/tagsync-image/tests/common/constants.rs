//! Shared test values

use tagsync_image::{Digest, RepositoryRef};

pub const BASE_REGISTRY: &str = "gcr.io";
pub const EU_REGISTRY: &str = "eu.gcr.io";
pub const US_REGISTRY: &str = "us.gcr.io";
pub const REPOSITORY: &str = "google-appengine/python";

/// Hex of the digest tagged `latest` in most scenarios
pub const HEX_LATEST: &str = "a1b2c3d4e5f60000000000000000000000000000000000000000000000000001";
/// Hex of an older digest
pub const HEX_OLD: &str = "0f0e0d0c0b0a0000000000000000000000000000000000000000000000000002";
/// Shares its first four characters with [`HEX_LATEST`]
pub const HEX_SIBLING: &str = "a1b2ffff00000000000000000000000000000000000000000000000000000003";

pub fn digest(hex: &str) -> Digest {
    Digest::parse(hex).expect("test digest must be valid")
}

pub fn repo(registry: &str) -> RepositoryRef {
    RepositoryRef::new(registry, REPOSITORY)
}
