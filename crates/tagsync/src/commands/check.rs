//! Config check command

use std::process::ExitCode;
use tagsync_core::TagConfig;

use crate::output;

/// Every file already passed schema and integrity checks while loading
pub fn run(configs: &[TagConfig]) -> ExitCode {
    for config in configs {
        output::success(&format!("{} is valid", config.path));
        output::kv("projects", &config.projects().len().to_string());
        output::kv("images", &config.image_count().to_string());
    }
    ExitCode::SUCCESS
}
