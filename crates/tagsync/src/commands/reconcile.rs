//! Reconcile command

use anyhow::Result;
use std::process::ExitCode;
use tagsync_core::TagConfig;
use tagsync_image::Reconciler;
use tracing::info;

use super::{build_registry, exit_code};
use crate::cli::Cli;
use crate::output;

pub async fn run(configs: &[TagConfig], cli: &Cli, dry_run: bool) -> Result<ExitCode> {
    let registry = build_registry(cli)?;
    let options = cli.options().with_dry_run(dry_run);

    // One engine for every file so later files see tags written by earlier ones
    let mut reconciler = Reconciler::new(&registry, options);
    for config in configs {
        info!("---Processing {}---", config.path);
        reconciler.reconcile_projects(config.projects()).await;
    }
    let report = reconciler.finish();

    if cli.json {
        output::json(&report)?;
    } else {
        output::report(&report);
    }

    Ok(exit_code(&report, cli.strict, false))
}
