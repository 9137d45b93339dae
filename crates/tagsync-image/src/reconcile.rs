//! Reconciliation engine
//!
//! Walks projects, images and registries in configuration order and drives
//! each (image, registry) pair through
//! `Pending -> Resolved -> Inspected -> {Skipped | Tagged | Failed}`.

use crate::apply::TagApplier;
use crate::error::ReconcileError;
use crate::inspect::Inspector;
use crate::registry::Registry;
use crate::report::{Decision, Outcome, PairReport, RunReport};
use crate::resolver::DigestResolver;
use crate::types::{Digest, ImageReference, RepositoryRef};
use tagsync_core::types::{ImageSpec, Project, ReconcileOptions};
use tracing::{debug, error, info, warn};

/// Drives one reconciliation pass against a [`Registry`]
pub struct Reconciler<'a, R: ?Sized> {
    options: ReconcileOptions,
    resolver: DigestResolver<'a, R>,
    inspector: Inspector<'a, R>,
    applier: TagApplier<'a, R>,
    report: RunReport,
}

impl<'a, R: Registry + ?Sized> Reconciler<'a, R> {
    pub fn new(registry: &'a R, options: ReconcileOptions) -> Self {
        Self {
            resolver: DigestResolver::new(registry),
            inspector: Inspector::new(registry),
            applier: TagApplier::new(registry, options.push_retry.clone()),
            report: RunReport::new(options.dry_run),
            options,
        }
    }

    /// Reconcile every project in order
    pub async fn reconcile_projects(&mut self, projects: &[Project]) {
        for project in projects {
            self.reconcile_project(project).await;
        }
    }

    /// Reconcile every image of `project` on every effective registry
    pub async fn reconcile_project(&mut self, project: &Project) {
        let registries = project.effective_registries();
        let base = RepositoryRef::new(&project.base_registry, &project.repository);

        debug!(
            "Reconciling {} ({} images, registries: {})",
            base,
            project.images.len(),
            registries.join(", ")
        );

        for image in &project.images {
            self.reconcile_image(project, &registries, &base, image).await;
        }
    }

    async fn reconcile_image(
        &mut self,
        project: &Project,
        registries: &[&str],
        base: &RepositoryRef,
        image: &ImageSpec,
    ) {
        let prefix = image.normalized_prefix();

        let digest = match self.resolver.resolve(base, &prefix).await {
            Ok(digest) => digest,
            Err(err) => {
                error!(kind = err.kind(), "{}", err);
                let decision = match &err {
                    ReconcileError::AmbiguousPrefix { .. } => Some(Decision::FailAmbiguousPrefix),
                    ReconcileError::PrefixNotFound { .. } => Some(Decision::FailPrefixNotFound),
                    _ => None,
                };
                self.fail_image(project, registries, image, None, decision, err);
                return;
            }
        };

        let source = base.at_digest(&digest);

        match self.inspector.inspect(&source).await {
            Ok(inspection) if inspection.exists => {}
            Ok(_) => {
                let err = ReconcileError::SourceDigestMissing {
                    image: source.to_string(),
                };
                error!(kind = err.kind(), "{}", err);
                self.fail_image(
                    project,
                    registries,
                    image,
                    Some(&digest),
                    Some(Decision::SkipNotFound),
                    err,
                );
                return;
            }
            Err(err) => {
                error!(kind = err.kind(), "{}", err);
                self.fail_image(project, registries, image, Some(&digest), None, err);
                return;
            }
        }

        for registry in registries {
            let pair = self
                .reconcile_registry(project, registry, image, &source, &digest)
                .await;
            self.report.record(pair);
        }

        if let Some(tags) = self.inspector.known_tags(&source) {
            let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
            debug!("Existing Tags for {}: {}", source, tags.join(", "));
        }
    }

    async fn reconcile_registry(
        &mut self,
        project: &Project,
        registry: &str,
        image: &ImageSpec,
        source: &ImageReference,
        digest: &Digest,
    ) -> PairReport {
        let repository = RepositoryRef::new(registry, &project.repository);
        let target = repository.at_digest(digest);

        let mut pair = PairReport {
            repository: project.repository.clone(),
            registry: registry.to_string(),
            tag: image.tag.clone(),
            prefix: image.digest_prefix.clone(),
            digest: Some(digest.clone()),
            decision: None,
            outcome: Outcome::Skipped,
            aborted: false,
        };

        let inspection = match self.inspector.inspect(&target).await {
            Ok(inspection) => inspection,
            Err(err) => {
                warn!(kind = err.kind(), "{}", err);
                pair.outcome = Outcome::Failed(err);
                return pair;
            }
        };

        if inspection.exists {
            let already_tagged = inspection
                .tagged_digest(&image.tag)
                .is_some_and(|tagged| tagged.matches_prefix(digest.hex()));

            if already_tagged {
                info!(
                    "Skipping tagging {} with {} as that tag already exists",
                    target, image.tag
                );
                pair.decision = Some(Decision::SkipAlreadyCorrect);
                return pair;
            }
        }

        pair.decision = Some(Decision::Tag);
        let destination = repository.at_tag(&image.tag);

        match self
            .applier
            .apply(source, &destination, self.options.dry_run)
            .await
        {
            Ok(()) => {
                self.inspector
                    .record_tag(&repository, &image.tag, digest)
                    .await;
                pair.outcome = Outcome::Tagged;
            }
            Err(err) => {
                warn!(kind = err.kind(), "{}", err);
                pair.outcome = Outcome::Failed(err);
            }
        }

        pair
    }

    /// Record the same failure for every registry of an aborted image
    ///
    /// Every such pair fails the run, whatever the error kind.
    fn fail_image(
        &mut self,
        project: &Project,
        registries: &[&str],
        image: &ImageSpec,
        digest: Option<&Digest>,
        decision: Option<Decision>,
        err: ReconcileError,
    ) {
        for registry in registries {
            self.report.record(PairReport {
                repository: project.repository.clone(),
                registry: registry.to_string(),
                tag: image.tag.clone(),
                prefix: image.digest_prefix.clone(),
                digest: digest.cloned(),
                decision,
                outcome: Outcome::Failed(err.clone()),
                aborted: true,
            });
        }
    }

    /// Report so far, without consuming the engine
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Close the pass and hand back its report
    pub fn finish(self) -> RunReport {
        let mut report = self.report;
        report.finish(self.applier.into_actions());
        report
    }
}

/// Run a full pass over `projects` with a fresh engine
pub async fn reconcile<R: Registry + ?Sized>(
    registry: &R,
    projects: &[Project],
    options: ReconcileOptions,
) -> RunReport {
    let mut reconciler = Reconciler::new(registry, options);
    reconciler.reconcile_projects(projects).await;
    reconciler.finish()
}
