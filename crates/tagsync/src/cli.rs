//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::Parser;
use tagsync_core::types::{ReconcileOptions, RetryPolicy};

/// tagsync - keep container image tags in sync across registries
#[derive(Parser, Debug)]
#[command(name = "tagsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Tag map files (JSON or YAML), processed in the order given
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<Utf8PathBuf>,

    /// Log the tags that would be written instead of writing them
    #[arg(long, conflicts_with_all = ["data_integrity", "check"])]
    pub dry_run: bool,

    /// Read-only audit: fail if any configured tag is not at its digest
    #[arg(long, conflicts_with = "check")]
    pub data_integrity: bool,

    /// Validate the files without contacting any registry
    #[arg(long)]
    pub check: bool,

    /// Treat registry failures (rejected pushes, unreachable mirrors) as fatal
    #[arg(long)]
    pub strict: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Upper bound for a single registry request, in seconds
    #[arg(
        long,
        env = "TAGSYNC_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    /// Push attempts for transient registry failures
    #[arg(
        long,
        env = "TAGSYNC_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_attempts: u32,

    /// Use plain HTTP for this registry host (repeatable)
    #[arg(
        long = "insecure-registry",
        value_name = "HOST",
        env = "TAGSYNC_INSECURE_REGISTRIES",
        value_delimiter = ','
    )]
    pub insecure_registries: Vec<String>,

    /// Allow registry credentials to be sent to a token realm on this host
    /// (repeatable)
    #[arg(
        long = "trust-token-realm",
        value_name = "HOST",
        env = "TAGSYNC_TRUSTED_TOKEN_REALMS",
        value_delimiter = ','
    )]
    pub trusted_token_realms: Vec<String>,
}

/// What a run does with the loaded files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Validate only
    Check,
    /// Compare configuration with the registries and report drift
    DataIntegrity,
    /// Reconcile, writing tags unless `dry_run`
    Reconcile { dry_run: bool },
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.check {
            Mode::Check
        } else if self.data_integrity {
            Mode::DataIntegrity
        } else {
            Mode::Reconcile {
                dry_run: self.dry_run,
            }
        }
    }

    /// Engine options from the command line
    pub fn options(&self) -> ReconcileOptions {
        ReconcileOptions {
            dry_run: self.dry_run,
            request_timeout_secs: self.timeout_secs,
            push_retry: RetryPolicy::default().with_max_attempts(self.max_attempts),
        }
    }
}
