//! Container image tag reconciliation for tagsync
//!
//! This crate provides:
//! - The [`Registry`] trait the reconciler talks to, and [`HttpRegistry`], an
//!   OCI distribution client with token auth and Docker credential lookup
//! - Digest prefix resolution ([`DigestResolver`])
//! - Existence and tag inspection with a per-run cache ([`Inspector`])
//! - Tag application with dry-run and push retries ([`TagApplier`])
//! - The reconciliation engine ([`Reconciler`]) and its [`RunReport`]
//!
//! # Example
//!
//! ```no_run
//! use tagsync_image::{reconcile, HttpRegistry};
//! use camino::Utf8Path;
//! use tagsync_core::{types::ReconcileOptions, TagConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TagConfig::load(Utf8Path::new("tags.json"))?;
//!     let registry = HttpRegistry::builder().build()?;
//!
//!     let options = ReconcileOptions::default().with_dry_run(true);
//!     let report = reconcile(&registry, config.projects(), options).await;
//!
//!     println!("{} tags would change", report.drift().count());
//!     Ok(())
//! }
//! ```

pub mod apply;
pub mod auth;
pub mod error;
pub mod inspect;
pub mod reconcile;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod types;

// Re-export main types for convenience
pub use apply::{TagAction, TagApplier};
pub use auth::{Anonymous, Credential, CredentialProvider, DockerCredentials};
pub use error::{ReconcileError, RegistryError};
pub use inspect::{Inspection, Inspector};
pub use reconcile::{reconcile, Reconciler};
pub use registry::{HttpRegistry, HttpRegistryBuilder, Registry};
pub use report::{Decision, Outcome, PairReport, RunReport, Summary};
pub use resolver::DigestResolver;
pub use types::{
    BlobDescriptor, Digest, ImageHandle, ImageReference, ManifestBlob, ManifestIndex, Reference,
    RepositoryRef,
};
