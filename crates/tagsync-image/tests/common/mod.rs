//! Common test infrastructure for tagsync-image tests
//!
//! # Modules
//!
//! - `constants`: Registry hosts, repository names and digests
//! - `builders`: Project and image spec builders
//! - `fake_registry`: In-memory [`tagsync_image::Registry`] with call
//!   recording and failure injection

// Not every test file uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod builders;
pub mod constants;
pub mod fake_registry;

pub use builders::*;
pub use constants::*;
pub use fake_registry::*;
