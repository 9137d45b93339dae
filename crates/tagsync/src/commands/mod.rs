//! CLI command implementations

pub mod check;
pub mod reconcile;
pub mod verify;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::process::ExitCode;
use tagsync_core::{SchemaValidator, TagConfig};
use tagsync_image::{HttpRegistry, RunReport};

use crate::cli::{Cli, Mode};
use crate::output;

/// Exit status for configuration load or validation errors
pub const EXIT_CONFIG: u8 = 2;

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let configs = match load_all(&cli.files) {
        Ok(configs) => configs,
        Err(errors) => {
            for err in &errors {
                output::error(&format!("{:#}", err));
            }
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };

    match cli.mode() {
        Mode::Check => Ok(check::run(&configs)),
        Mode::DataIntegrity => verify::run(&configs, &cli).await,
        Mode::Reconcile { dry_run } => reconcile::run(&configs, &cli, dry_run).await,
    }
}

/// Load and validate every file before any registry is contacted, reporting
/// all failures rather than the first one
pub fn load_all(files: &[Utf8PathBuf]) -> std::result::Result<Vec<TagConfig>, Vec<anyhow::Error>> {
    let validator = match SchemaValidator::new() {
        Ok(validator) => validator,
        Err(e) => return Err(vec![anyhow::Error::new(e).context("Failed to compile schema")]),
    };

    let mut configs = Vec::with_capacity(files.len());
    let mut errors = Vec::new();

    for path in files {
        match TagConfig::load_with(path, &validator).with_context(|| format!("Invalid tag map {}", path)) {
            Ok(config) => configs.push(config),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(configs)
    } else {
        Err(errors)
    }
}

pub(crate) fn build_registry(cli: &Cli) -> Result<HttpRegistry> {
    let builder = HttpRegistry::builder().request_timeout(cli.options().request_timeout());
    let builder = cli
        .insecure_registries
        .iter()
        .fold(builder, |builder, host| builder.insecure_registry(host.trim()));
    cli.trusted_token_realms
        .iter()
        .fold(builder, |builder, host| builder.trust_token_realm(host.trim()))
        .build()
        .context("Failed to create registry client")
}

/// Exit status for a finished run
///
/// Abandoned images always fail the run. Other registry failures fail it
/// only with `strict`, and drift only when `drift_fails`.
pub(crate) fn exit_code(report: &RunReport, strict: bool, drift_fails: bool) -> ExitCode {
    let failed = report.has_abort_failures()
        || (strict && report.has_failures())
        || (drift_fails && report.drift().next().is_some());

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
