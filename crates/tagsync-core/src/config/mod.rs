//! Tag map loading and integrity checks

mod integrity;
mod loader;

pub use integrity::check_integrity;
pub use loader::TagConfig;
