//! Per-run record of decisions and outcomes

use crate::apply::TagAction;
use crate::error::ReconcileError;
use crate::types::Digest;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What the engine decided for one (project, image, registry) triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The tag is missing or points elsewhere
    Tag,
    /// The tag already points at the resolved digest
    SkipAlreadyCorrect,
    /// The resolved digest is missing from the base repository
    SkipNotFound,
    /// The prefix matches several digests
    FailAmbiguousPrefix,
    /// The prefix matches no digest
    FailPrefixNotFound,
}

/// Terminal state of a triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Tagged,
    Skipped,
    Failed(ReconcileError),
}

impl Outcome {
    pub fn error(&self) -> Option<&ReconcileError> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Result for one (project, image, registry) triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairReport {
    /// Repository path shared by the project's registries
    pub repository: String,
    /// Registry the tag was checked on
    pub registry: String,
    pub tag: String,
    /// Configured digest prefix
    pub prefix: String,
    /// Resolved digest, absent when resolution failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
    /// `None` when a registry read failed before a decision could be made
    pub decision: Option<Decision>,
    pub outcome: Outcome,
    /// The whole image was abandoned before this registry was looked at
    pub aborted: bool,
}

/// Counters over a run's triples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub tagged: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Failures that abandoned a whole image
    pub aborted: usize,
}

/// Everything a reconciliation pass did
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub summary: Summary,
    pub pairs: Vec<PairReport>,
    /// Tag writes performed or simulated, in order
    pub actions: Vec<TagAction>,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            summary: Summary::default(),
            pairs: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn record(&mut self, pair: PairReport) {
        match &pair.outcome {
            Outcome::Tagged => self.summary.tagged += 1,
            Outcome::Skipped => self.summary.skipped += 1,
            Outcome::Failed(err) => {
                self.summary.failed += 1;
                if pair.aborted || err.is_abort_class() {
                    self.summary.aborted += 1;
                }
            }
        }
        self.pairs.push(pair);
    }

    pub fn finish(&mut self, actions: Vec<TagAction>) {
        self.actions.extend(actions);
        self.finished_at = Some(Utc::now());
    }

    /// Any image abandoned before reaching its registries; such a run
    /// must fail
    pub fn has_abort_failures(&self) -> bool {
        self.summary.aborted > 0
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    /// Decisions sequence in processing order
    pub fn decisions(&self) -> Vec<Option<Decision>> {
        self.pairs.iter().map(|p| p.decision).collect()
    }

    /// Triples whose tag does not point at the configured digest
    pub fn drift(&self) -> impl Iterator<Item = &PairReport> {
        self.pairs
            .iter()
            .filter(|p| p.decision == Some(Decision::Tag))
    }
}
