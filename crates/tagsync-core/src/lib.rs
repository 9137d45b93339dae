//! # tagsync-core
//!
//! Core library for tagsync providing:
//! - Tag map parsing (JSON or YAML documents mapping digests to tags)
//! - JSON Schema and integrity validation of tag maps
//! - Runtime options shared by the reconciler
//! - Retry execution engine with policy-based configuration

pub mod config;
pub mod error;
pub mod retry;
pub mod schema;
pub mod types;

pub use config::TagConfig;
pub use error::{Error, Result};
pub use schema::SchemaValidator;
