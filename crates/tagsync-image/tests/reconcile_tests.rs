//! Engine tests against an in-memory registry
//!
//! Tests cover:
//! - Idempotence and dry-run behaviour
//! - Prefix resolution failures
//! - Skip, tag and retag decisions
//! - Registry ordering and deduplication
//! - Failure containment, push retries and unreachable registries

mod common;

use common::*;
use std::time::Duration;
use tagsync_core::{types::TagConfigFile, SchemaValidator, TagConfig};
use tagsync_image::{
    reconcile, Decision, DigestResolver, Outcome, ReconcileError, RegistryError,
};

fn status(code: u16) -> RegistryError {
    RegistryError::Status {
        method: "PUT".to_string(),
        url: "https://eu.gcr.io/v2/google-appengine/python/manifests/latest".to_string(),
        status: code,
        body: "denied".to_string(),
    }
}

/// Base repository with the `latest` digest untagged and an older digest
fn seeded_registry() -> FakeRegistry {
    FakeRegistry::new()
        .with_image(&repo(BASE_REGISTRY), HEX_LATEST, &[])
        .with_image(&repo(BASE_REGISTRY), HEX_OLD, &["legacy"])
}

#[tokio::test]
async fn test_scenario_two_registries_two_tag_calls() {
    let json = r#"{"projects":[{"base_registry":"gcr.io","additional_registries":["eu.gcr.io"],"repository":"foo/bar","images":[{"digest":"abc","tag":"latest"}]}]}"#;
    let config: TagConfigFile = TagConfig::parse(json, false, &SchemaValidator::new().unwrap()).unwrap();

    let hex = "abc1230000000000000000000000000000000000000000000000000000000000";
    let foo_bar = tagsync_image::RepositoryRef::new("gcr.io", "foo/bar");
    let registry = FakeRegistry::new().with_image(&foo_bar, hex, &[]);

    let report = reconcile(&registry, &config.projects, test_options(false)).await;

    assert_eq!(report.actions.len(), 2);
    assert_eq!(
        report.actions[0].destination,
        "eu.gcr.io/foo/bar:latest"
    );
    assert_eq!(report.actions[1].destination, "gcr.io/foo/bar:latest");
    for action in &report.actions {
        assert_eq!(action.source, format!("gcr.io/foo/bar@sha256:{}", hex));
        assert!(!action.dry_run);
    }
    assert_eq!(registry.count(Op::Push), 2);
    assert_eq!(
        report.decisions(),
        vec![Some(Decision::Tag), Some(Decision::Tag)]
    );
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let registry = seeded_registry();
    let projects = vec![ProjectBuilder::new()
        .mirror(EU_REGISTRY)
        .mirror(US_REGISTRY)
        .image("a1b2c3", "latest")
        .image("0f0e", "legacy")
        .build()];

    let first = reconcile(&registry, &projects, test_options(false)).await;
    assert!(!first.has_failures());
    assert_eq!(first.summary.tagged, 5);
    assert_eq!(first.summary.skipped, 1);

    let pushes_after_first = registry.count(Op::Push);
    let second = reconcile(&registry, &projects, test_options(false)).await;

    assert_eq!(registry.count(Op::Push), pushes_after_first);
    assert!(second.actions.is_empty());
    assert!(second
        .decisions()
        .iter()
        .all(|d| *d == Some(Decision::SkipAlreadyCorrect)));
}

#[tokio::test]
async fn test_dry_run_matches_real_decisions_without_mutation() {
    let projects = vec![
        ProjectBuilder::new()
            .mirror(EU_REGISTRY)
            .image("a1b2c3", "latest")
            .image("0f0e", "legacy")
            .build(),
        // Same repository again: the second pass must see the first one's tags
        ProjectBuilder::new()
            .mirror(EU_REGISTRY)
            .image("a1b2c3", "latest")
            .build(),
    ];

    let dry_registry = seeded_registry();
    let before = dry_registry.snapshot();
    let dry = reconcile(&dry_registry, &projects, test_options(true)).await;

    assert_eq!(dry_registry.snapshot(), before);
    assert_eq!(dry_registry.count(Op::Push), 0);
    assert_eq!(dry_registry.count(Op::Pull), 0);
    assert!(dry.actions.iter().all(|a| a.dry_run));

    let real_registry = seeded_registry();
    let real = reconcile(&real_registry, &projects, test_options(false)).await;

    assert_eq!(dry.decisions(), real.decisions());
    assert_eq!(
        dry.decisions(),
        vec![
            Some(Decision::Tag),
            Some(Decision::Tag),
            Some(Decision::Tag),
            Some(Decision::SkipAlreadyCorrect),
            Some(Decision::SkipAlreadyCorrect),
            Some(Decision::SkipAlreadyCorrect),
        ]
    );
}

#[tokio::test]
async fn test_prefix_uniqueness() {
    let foo_bar = tagsync_image::RepositoryRef::new("gcr.io", "foo/bar");
    let registry = FakeRegistry::new()
        .with_image(&foo_bar, "abc1230000000000000000000000000000000000000000000000000000000000", &[])
        .with_image(&foo_bar, "abcde00000000000000000000000000000000000000000000000000000000000", &[]);

    let mut resolver = DigestResolver::new(&registry);

    let err = resolver.resolve(&foo_bar, "abc").await.unwrap_err();
    assert!(matches!(err, ReconcileError::AmbiguousPrefix { matches: 2, .. }));

    let digest = resolver.resolve(&foo_bar, "abc1").await.unwrap();
    assert!(digest.hex().starts_with("abc123"));

    let err = resolver.resolve(&foo_bar, "zzz").await.unwrap_err();
    assert!(matches!(err, ReconcileError::PrefixNotFound { .. }));

    // The listing is fetched once for all three lookups
    assert_eq!(registry.count(Op::List), 1);
}

#[tokio::test]
async fn test_ambiguous_prefix_aborts_image_on_every_registry() {
    let registry = seeded_registry().with_image(&repo(BASE_REGISTRY), HEX_SIBLING, &[]);
    let projects = vec![ProjectBuilder::new()
        .mirror(EU_REGISTRY)
        .image("a1b2", "latest")
        .image("0f0e", "legacy")
        .build()];

    let report = reconcile(&registry, &projects, test_options(false)).await;

    assert_eq!(
        report.decisions(),
        vec![
            Some(Decision::FailAmbiguousPrefix),
            Some(Decision::FailAmbiguousPrefix),
            Some(Decision::Tag),
            Some(Decision::SkipAlreadyCorrect),
        ]
    );
    assert!(report.has_abort_failures());
    assert_eq!(report.summary.aborted, 2);
    assert!(registry.tagged(&repo(EU_REGISTRY), "latest").is_none());
}

#[tokio::test]
async fn test_unknown_prefix_fails_with_prefix_not_found() {
    let registry = seeded_registry();
    let projects = vec![ProjectBuilder::new().image("ffff", "latest").build()];

    let report = reconcile(&registry, &projects, test_options(false)).await;

    assert_eq!(report.decisions(), vec![Some(Decision::FailPrefixNotFound)]);
    assert!(matches!(
        report.pairs[0].outcome,
        Outcome::Failed(ReconcileError::PrefixNotFound { .. })
    ));
    assert_eq!(registry.count(Op::Push), 0);
}

#[tokio::test]
async fn test_skip_when_tag_already_points_at_digest() {
    let registry = seeded_registry().with_image(&repo(EU_REGISTRY), HEX_LATEST, &["v1"]);
    let projects = vec![ProjectBuilder::new()
        .base(BASE_REGISTRY)
        .mirror(EU_REGISTRY)
        .image("a1b2c3", "v1")
        .build()];

    let report = reconcile(&registry, &projects, test_options(false)).await;

    assert_eq!(report.pairs[0].registry, EU_REGISTRY);
    assert_eq!(report.pairs[0].decision, Some(Decision::SkipAlreadyCorrect));
    assert_eq!(registry.count_on(Op::Push, EU_REGISTRY), 0);
    assert_eq!(registry.count_on(Op::Pull, EU_REGISTRY), 0);
}

#[tokio::test]
async fn test_retag_when_tag_points_elsewhere() {
    let registry = seeded_registry()
        .with_image(&repo(EU_REGISTRY), HEX_LATEST, &[])
        .with_image(&repo(EU_REGISTRY), HEX_OLD, &["v1"]);
    let projects = vec![ProjectBuilder::new()
        .mirror(EU_REGISTRY)
        .image("a1b2c3", "v1")
        .build()];

    let report = reconcile(&registry, &projects, test_options(false)).await;

    let eu_actions: Vec<_> = report
        .actions
        .iter()
        .filter(|a| a.destination.starts_with(EU_REGISTRY))
        .collect();
    assert_eq!(eu_actions.len(), 1);
    assert_eq!(
        eu_actions[0].destination,
        format!("{}/{}:v1", EU_REGISTRY, REPOSITORY)
    );
    assert!(eu_actions[0].source.ends_with(HEX_LATEST));
    assert_eq!(
        registry.tagged(&repo(EU_REGISTRY), "v1"),
        Some(digest(HEX_LATEST))
    );
}

#[tokio::test]
async fn test_registries_deduplicated_with_base_last() {
    let registry = seeded_registry();
    let projects = vec![ProjectBuilder::new()
        .mirror(EU_REGISTRY)
        .mirror(BASE_REGISTRY)
        .mirror(US_REGISTRY)
        .mirror(EU_REGISTRY)
        .image("a1b2c3", "latest")
        .build()];

    let report = reconcile(&registry, &projects, test_options(false)).await;

    let registries: Vec<&str> = report.pairs.iter().map(|p| p.registry.as_str()).collect();
    assert_eq!(registries, vec![EU_REGISTRY, US_REGISTRY, BASE_REGISTRY]);
    assert_eq!(registry.count_on(Op::Push, BASE_REGISTRY), 1);
}

#[tokio::test]
async fn test_push_rejection_is_contained() {
    let registry = seeded_registry();
    registry.fail(Op::Push, EU_REGISTRY, status(403), Some(1));
    let projects = vec![ProjectBuilder::new()
        .mirror(EU_REGISTRY)
        .image("a1b2c3", "latest")
        .image("0f0e", "legacy")
        .build()];

    let report = reconcile(&registry, &projects, test_options(false)).await;

    assert!(matches!(
        report.pairs[0].outcome,
        Outcome::Failed(ReconcileError::PushRejected { .. })
    ));
    // Non-transient: a single attempt
    assert_eq!(registry.count_on(Op::Push, EU_REGISTRY), 2);
    assert_eq!(report.pairs[1].outcome, Outcome::Tagged);
    assert_eq!(report.pairs[2].outcome, Outcome::Tagged);
    assert_eq!(
        registry.tagged(&repo(EU_REGISTRY), "legacy"),
        Some(digest(HEX_OLD))
    );
    assert!(report.has_failures());
    assert!(!report.has_abort_failures());
}

#[tokio::test]
async fn test_transient_push_failures_are_retried() {
    let registry = seeded_registry();
    registry.fail(Op::Push, EU_REGISTRY, status(503), Some(2));
    let projects = vec![ProjectBuilder::new()
        .mirror(EU_REGISTRY)
        .image("a1b2c3", "latest")
        .build()];

    let report = reconcile(&registry, &projects, test_options(false)).await;

    assert_eq!(registry.count_on(Op::Push, EU_REGISTRY), 3);
    assert_eq!(report.pairs[0].outcome, Outcome::Tagged);
    assert!(!report.has_failures());
}

#[tokio::test]
async fn test_exhausted_push_retries_reject() {
    let registry = seeded_registry();
    registry.fail(Op::Push, EU_REGISTRY, status(429), None);
    let projects = vec![ProjectBuilder::new()
        .mirror(EU_REGISTRY)
        .image("a1b2c3", "latest")
        .build()];

    let report = reconcile(&registry, &projects, test_options(false)).await;

    assert_eq!(registry.count_on(Op::Push, EU_REGISTRY), 3);
    assert!(matches!(
        report.pairs[0].outcome,
        Outcome::Failed(ReconcileError::PushRejected { .. })
    ));
    assert_eq!(report.pairs[1].outcome, Outcome::Tagged);
}

#[tokio::test]
async fn test_pull_failure_reports_source_not_found() {
    let registry = seeded_registry();
    registry.fail(
        Op::Pull,
        BASE_REGISTRY,
        RegistryError::NotFound {
            reference: "gone".to_string(),
        },
        None,
    );
    let projects = vec![ProjectBuilder::new()
        .mirror(EU_REGISTRY)
        .image("a1b2c3", "latest")
        .build()];

    let report = reconcile(&registry, &projects, test_options(false)).await;

    assert_eq!(report.summary.failed, 2);
    for pair in &report.pairs {
        assert_eq!(pair.decision, Some(Decision::Tag));
        assert!(matches!(
            pair.outcome,
            Outcome::Failed(ReconcileError::SourceNotFound { .. })
        ));
    }
    assert!(!report.has_abort_failures());
}

#[tokio::test]
async fn test_missing_source_digest_aborts_image() {
    let registry = seeded_registry();
    registry.hide(repo(BASE_REGISTRY).at_digest(&digest(HEX_LATEST)));
    let projects = vec![ProjectBuilder::new()
        .mirror(EU_REGISTRY)
        .image("a1b2c3", "latest")
        .image("0f0e", "legacy")
        .build()];

    let report = reconcile(&registry, &projects, test_options(false)).await;

    assert_eq!(report.pairs[0].decision, Some(Decision::SkipNotFound));
    assert!(matches!(
        report.pairs[0].outcome,
        Outcome::Failed(ReconcileError::SourceDigestMissing { .. })
    ));
    assert_eq!(report.pairs[1].decision, Some(Decision::SkipNotFound));
    // The next image is unaffected
    assert_eq!(report.pairs[2].outcome, Outcome::Tagged);
    assert_eq!(registry.count_on(Op::Push, EU_REGISTRY), 1);
}

#[tokio::test]
async fn test_unavailable_mirror_does_not_block_base() {
    let registry = seeded_registry();
    registry.fail(Op::Exists, EU_REGISTRY, status(502), None);
    let projects = vec![ProjectBuilder::new()
        .mirror(EU_REGISTRY)
        .image("a1b2c3", "latest")
        .build()];

    let report = reconcile(&registry, &projects, test_options(false)).await;

    assert_eq!(report.pairs[0].decision, None);
    assert!(matches!(
        report.pairs[0].outcome,
        Outcome::Failed(ReconcileError::RegistryUnavailable { .. })
    ));
    assert_eq!(report.pairs[1].outcome, Outcome::Tagged);
}

#[tokio::test]
async fn test_unreachable_base_fails_the_run() {
    let registry = seeded_registry();
    registry.fail(
        Op::List,
        BASE_REGISTRY,
        RegistryError::Timeout {
            operation: "request to https://gcr.io/v2/google-appengine/python/tags/list".to_string(),
            after: Duration::from_secs(30),
        },
        None,
    );
    let projects = vec![ProjectBuilder::new()
        .mirror(EU_REGISTRY)
        .image("a1b2c3", "latest")
        .build()];

    let report = reconcile(&registry, &projects, test_options(true)).await;

    assert_eq!(report.pairs.len(), 2);
    for pair in &report.pairs {
        assert!(pair.aborted);
        match &pair.outcome {
            Outcome::Failed(ReconcileError::RegistryUnavailable { reason, .. }) => {
                assert!(reason.contains("timed out"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
    assert_eq!(report.summary.aborted, 2);
    assert!(report.has_abort_failures());
    assert_eq!(registry.count(Op::Exists), 0);
}

#[tokio::test]
async fn test_unreachable_mirror_does_not_abort_the_run() {
    let registry = seeded_registry();
    registry.fail(Op::Exists, EU_REGISTRY, status(503), None);
    let projects = vec![ProjectBuilder::new()
        .mirror(EU_REGISTRY)
        .image("a1b2c3", "latest")
        .build()];

    let report = reconcile(&registry, &projects, test_options(true)).await;

    assert!(!report.pairs[0].aborted);
    assert!(report.has_failures());
    assert!(!report.has_abort_failures());
}

#[tokio::test]
async fn test_each_triple_checked_once() {
    let registry = seeded_registry();
    let projects = vec![ProjectBuilder::new()
        .mirror(EU_REGISTRY)
        .image("a1b2c3", "latest")
        .image("a1b2c3", "stable")
        .build()];

    let report = reconcile(&registry, &projects, test_options(false)).await;

    assert_eq!(report.summary.tagged, 4);
    assert_eq!(registry.count_on(Op::Exists, EU_REGISTRY), 1);
    assert_eq!(registry.count_on(Op::Exists, BASE_REGISTRY), 1);
    // One pull serves every destination
    assert_eq!(registry.count(Op::Pull), 1);
}
