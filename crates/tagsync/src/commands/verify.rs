//! Data integrity command
//!
//! A dry run in which every tag the engine would write counts as drift
//! between the tag maps and the registries. A triple that could not be
//! checked fails the audit too.

use anyhow::Result;
use std::process::ExitCode;
use tagsync_core::TagConfig;
use tagsync_image::Reconciler;
use tracing::info;

use super::{build_registry, exit_code};
use crate::cli::Cli;
use crate::output;

pub async fn run(configs: &[TagConfig], cli: &Cli) -> Result<ExitCode> {
    let registry = build_registry(cli)?;
    let options = cli.options().with_dry_run(true);

    let mut reconciler = Reconciler::new(&registry, options);
    for config in configs {
        info!("---Checking {}---", config.path);
        reconciler.reconcile_projects(config.projects()).await;
    }
    let report = reconciler.finish();

    if cli.json {
        output::json(&report)?;
    } else {
        output::drift(&report);
        for pair in &report.pairs {
            if let Some(err) = pair.outcome.error() {
                output::error(&format!("{}: {}", pair.registry, err));
            }
        }
    }

    Ok(exit_code(&report, true, true))
}
