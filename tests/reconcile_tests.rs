//! # Bootstrap Engine Integration Tests
//!
//! Drives the engine against an in-memory cluster and verifies:
//! - convergence within one pass per step, then no-ops
//! - creation order
//! - configuration errors stop the pass without creating anything
//! - transient secret reads stay transient
//! - concurrent creators and cancellation

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use dex_operator::controller::builders::BuildError;
use dex_operator::controller::dex_config::TranslateError;
use dex_operator::controller::reconciler::{
    BootstrapEngine, BootstrapStep, PassOutcome, ReconcilerError,
};
use dex_operator::controller::resolver::ResolveError;
use dex_operator::controller::store::{ManagedObject, ObjectKind, StoreError};
use dex_operator::crd::{ConnectorError, ConnectorSpec, ConnectorType};
use tokio_util::sync::CancellationToken;

fn engine(store: &Arc<FakeStore>, image: Option<&str>) -> BootstrapEngine {
    BootstrapEngine::new(store.clone(), image.map(str::to_string))
}

#[tokio::test]
async fn test_converges_in_one_pass_per_step_then_noop() {
    let store = FakeStore::new();
    store.insert(secret(NAMESPACE, "gh-secret", &[("clientSecret", b"xyz".as_slice())]));
    let engine = engine(&store, Some(DEX_IMAGE));
    let instance = dex_server(ISSUER, vec![github_connector("gh-secret", None)]);
    let cancel = CancellationToken::new();

    for expected in BootstrapStep::ORDER {
        match engine.run(&instance, &cancel).await.unwrap() {
            PassOutcome::Advanced { step, conflicted, .. } => {
                assert_eq!(step, expected);
                assert!(conflicted.is_empty());
            }
            PassOutcome::Converged => panic!("converged before {expected}"),
        }
    }

    let created = store.creations();
    assert_eq!(created.len(), 9);

    for _ in 0..3 {
        assert_eq!(
            engine.run(&instance, &cancel).await.unwrap(),
            PassOutcome::Converged
        );
    }
    assert_eq!(store.creations(), created, "no-op passes must not create");
}

#[tokio::test]
async fn test_objects_are_created_in_step_order() {
    let store = FakeStore::new();
    let engine = engine(&store, Some(DEX_IMAGE));
    let instance = dex_server(ISSUER, Vec::new());
    let cancel = CancellationToken::new();

    while let PassOutcome::Advanced { .. } = engine.run(&instance, &cancel).await.unwrap() {}

    let kinds: Vec<ObjectKind> = store.creations().iter().map(|key| key.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ObjectKind::Secret,
            ObjectKind::ConfigMap,
            ObjectKind::Service,
            ObjectKind::Service,
            ObjectKind::ServiceAccount,
            ObjectKind::ClusterRole,
            ObjectKind::ClusterRoleBinding,
            ObjectKind::Deployment,
            ObjectKind::Route,
        ]
    );
    assert!(store.contains(&key(ObjectKind::Secret, "grpc-mtls")));
    assert!(store.contains(&key(ObjectKind::Service, "grpc")));
    assert!(store.contains(&key(
        ObjectKind::ClusterRoleBinding,
        "dex-operator-dexsso-dex-system"
    )));
}

#[tokio::test]
async fn test_every_created_object_is_owned_by_the_dex_server() {
    let store = FakeStore::new();
    let engine = engine(&store, Some(DEX_IMAGE));
    let instance = dex_server(ISSUER, Vec::new());
    let cancel = CancellationToken::new();

    while let PassOutcome::Advanced { .. } = engine.run(&instance, &cancel).await.unwrap() {}

    for key in store.creations() {
        let object = store.get(&key).unwrap();
        let owners = object.metadata().owner_references.clone().unwrap_or_default();
        assert_eq!(owners.len(), 1, "{key} should have one owner");
        assert_eq!(owners[0].kind, "DexServer");
        assert_eq!(owners[0].name, "dex");
        assert_eq!(owners[0].controller, Some(true));
    }
}

#[tokio::test]
async fn test_only_the_missing_service_is_created() {
    let store = FakeStore::new();
    let engine = engine(&store, Some(DEX_IMAGE));
    let instance = dex_server(ISSUER, Vec::new());
    let cancel = CancellationToken::new();

    // Secret and config map
    engine.run(&instance, &cancel).await.unwrap();
    engine.run(&instance, &cancel).await.unwrap();

    let meta = dex_operator::controller::builders::InstanceMeta::from_instance(&instance).unwrap();
    store.insert(ManagedObject::Service(
        dex_operator::controller::builders::primary_service(&meta),
    ));

    match engine.run(&instance, &cancel).await.unwrap() {
        PassOutcome::Advanced { step, created, .. } => {
            assert_eq!(step, BootstrapStep::Services);
            assert_eq!(created, vec![key(ObjectKind::Service, "grpc")]);
        }
        PassOutcome::Converged => panic!("services step should have run"),
    }
}

#[tokio::test]
async fn test_missing_image_fails_deployment_step_only() {
    let store = FakeStore::new();
    let engine = engine(&store, None);
    let instance = dex_server(ISSUER, Vec::new());
    let cancel = CancellationToken::new();

    for _ in 0..6 {
        assert!(matches!(
            engine.run(&instance, &cancel).await.unwrap(),
            PassOutcome::Advanced { .. }
        ));
    }

    let err = engine.run(&instance, &cancel).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcilerError::Build {
            step: BootstrapStep::Deployment,
            source: BuildError::MissingImage
        }
    ));
    assert!(!err.is_transient());
    assert!(!store.contains(&key(ObjectKind::Deployment, "dex")));
    assert!(!store.contains(&key(ObjectKind::Route, "dex")));
}

#[tokio::test]
async fn test_invalid_issuer_creates_no_route() {
    let store = FakeStore::new();
    let engine = engine(&store, Some(DEX_IMAGE));
    let instance = dex_server("not a url", Vec::new());
    let cancel = CancellationToken::new();

    for _ in 0..7 {
        engine.run(&instance, &cancel).await.unwrap();
    }

    let err = engine.run(&instance, &cancel).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcilerError::Build {
            step: BootstrapStep::Route,
            source: BuildError::InvalidIssuer { .. }
        }
    ));
    assert!(!store.contains(&key(ObjectKind::Route, "dex")));
}

#[tokio::test]
async fn test_ldap_with_missing_bind_secret_creates_no_config_map() {
    let store = FakeStore::new();
    let engine = engine(&store, Some(DEX_IMAGE));
    let instance = dex_server(ISSUER, vec![ldap_connector("ldap-bind")]);
    let cancel = CancellationToken::new();

    engine.run(&instance, &cancel).await.unwrap();
    let mtls_key = key(ObjectKind::Secret, "grpc-mtls");
    let mtls_before = store.get(&mtls_key).unwrap();

    let err = engine.run(&instance, &cancel).await.unwrap_err();
    match &err {
        ReconcilerError::Translate(TranslateError::Resolve { connector, source }) => {
            assert_eq!(connector, "corp");
            assert!(matches!(source, ResolveError::SecretNotFound { .. }));
        }
        other => panic!("expected a translation error, got {other:?}"),
    }
    assert!(!err.is_transient());
    assert!(!store.contains(&key(ObjectKind::ConfigMap, "dex")));
    assert_eq!(store.get(&mtls_key).unwrap(), mtls_before);
    assert_eq!(store.creations(), vec![mtls_key]);
}

#[tokio::test]
async fn test_flaky_connector_secret_read_is_transient() {
    let store = FakeStore::new();
    store.insert(secret(NAMESPACE, "gh-secret", &[("clientSecret", b"xyz".as_slice())]));
    let engine = engine(&store, Some(DEX_IMAGE));
    let instance = dex_server(ISSUER, vec![github_connector("gh-secret", None)]);
    let cancel = CancellationToken::new();

    engine.run(&instance, &cancel).await.unwrap();
    store.fail_fetch_of(key(ObjectKind::Secret, "gh-secret"));

    let err = engine.run(&instance, &cancel).await.unwrap_err();
    match &err {
        ReconcilerError::Translate(TranslateError::Resolve { connector, source }) => {
            assert_eq!(connector, "gh");
            assert!(matches!(source, ResolveError::Store(StoreError::Api(_))));
        }
        other => panic!("expected a translation error, got {other:?}"),
    }
    assert!(err.is_transient());
    assert_eq!(err.metric_label(), "platform");
    assert!(!store.contains(&key(ObjectKind::ConfigMap, "dex")));
}

#[tokio::test]
async fn test_unsupported_connector_type_fails_the_config_step() {
    let store = FakeStore::new();
    let engine = engine(&store, Some(DEX_IMAGE));
    let saml = ConnectorSpec {
        kind: ConnectorType::Unsupported("saml".to_string()),
        id: "okta".to_string(),
        name: "Okta".to_string(),
        github: None,
        ldap: None,
    };
    let instance = dex_server(ISSUER, vec![saml]);
    let cancel = CancellationToken::new();

    engine.run(&instance, &cancel).await.unwrap();
    let err = engine.run(&instance, &cancel).await.unwrap_err();
    match &err {
        ReconcilerError::Translate(TranslateError::Connector { connector, source }) => {
            assert_eq!(connector, "okta");
            assert_eq!(*source, ConnectorError::UnsupportedType("saml".to_string()));
        }
        other => panic!("expected a connector error, got {other:?}"),
    }
    assert!(!err.is_transient());
    assert_eq!(err.metric_label(), "configuration");
    assert!(!store.contains(&key(ObjectKind::ConfigMap, "dex")));
}

#[tokio::test]
async fn test_connector_without_its_section_fails_the_config_step() {
    let store = FakeStore::new();
    let engine = engine(&store, Some(DEX_IMAGE));
    let mut connector = github_connector("gh-secret", None);
    connector.kind = ConnectorType::Ldap;
    let instance = dex_server(ISSUER, vec![connector]);
    let cancel = CancellationToken::new();

    engine.run(&instance, &cancel).await.unwrap();
    let err = engine.run(&instance, &cancel).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcilerError::Translate(TranslateError::Connector {
            source: ConnectorError::MissingSection { kind: "ldap" },
            ..
        })
    ));
    assert!(!err.is_transient());
    assert_eq!(store.creations(), vec![key(ObjectKind::Secret, "grpc-mtls")]);
}

#[tokio::test]
async fn test_create_conflict_counts_as_success() {
    let store = FakeStore::new();
    let mtls_key = key(ObjectKind::Secret, "grpc-mtls");
    store.race_create_of(mtls_key.clone());
    let engine = engine(&store, Some(DEX_IMAGE));
    let instance = dex_server(ISSUER, Vec::new());
    let cancel = CancellationToken::new();

    match engine.run(&instance, &cancel).await.unwrap() {
        PassOutcome::Advanced {
            step,
            created,
            conflicted,
        } => {
            assert_eq!(step, BootstrapStep::MtlsSecret);
            assert!(created.is_empty());
            assert_eq!(conflicted, vec![mtls_key]);
        }
        PassOutcome::Converged => panic!("secret step should have run"),
    }

    match engine.run(&instance, &cancel).await.unwrap() {
        PassOutcome::Advanced { step, .. } => assert_eq!(step, BootstrapStep::ConfigMap),
        PassOutcome::Converged => panic!("config map step should run next"),
    }
}

#[tokio::test]
async fn test_concurrent_passes_create_the_secret_once() {
    let store = FakeStore::new();
    store.sync_missing_fetches_of(ObjectKind::Secret, 2);
    let first = engine(&store, Some(DEX_IMAGE));
    let second = engine(&store, Some(DEX_IMAGE));
    let instance = dex_server(ISSUER, Vec::new());
    let cancel = CancellationToken::new();

    // Both passes observe the secret missing before either creates it
    let (a, b) = tokio::join!(first.run(&instance, &cancel), second.run(&instance, &cancel));
    let outcomes = [a.unwrap(), b.unwrap()];

    let mut created = 0;
    let mut conflicted = 0;
    for outcome in &outcomes {
        match outcome {
            PassOutcome::Advanced {
                step,
                created: c,
                conflicted: x,
            } => {
                assert_eq!(*step, BootstrapStep::MtlsSecret);
                created += c.len();
                conflicted += x.len();
            }
            PassOutcome::Converged => panic!("both passes should run the secret step"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(conflicted, 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_transient_fetch_error_propagates() {
    let store = FakeStore::new();
    store.fail_fetches_of(ObjectKind::ConfigMap);
    let engine = engine(&store, Some(DEX_IMAGE));
    let instance = dex_server(ISSUER, Vec::new());
    let cancel = CancellationToken::new();

    engine.run(&instance, &cancel).await.unwrap();
    let err = engine.run(&instance, &cancel).await.unwrap_err();
    assert!(matches!(err, ReconcilerError::Platform(StoreError::Api(_))));
    assert!(err.is_transient());
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_calls() {
    let store = FakeStore::new();
    store.hang();
    let engine = engine(&store, Some(DEX_IMAGE));
    let instance = dex_server(ISSUER, Vec::new());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), engine.run(&instance, &cancel))
        .await
        .expect("cancellation should end the pass");
    let err = result.unwrap_err();
    assert!(matches!(err, ReconcilerError::Cancelled));
    assert!(err.is_transient());
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn test_instance_without_uid_is_rejected() {
    let store = FakeStore::new();
    let engine = engine(&store, Some(DEX_IMAGE));
    let mut instance = dex_server(ISSUER, Vec::new());
    instance.metadata.uid = None;

    let err = engine
        .run(&instance, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReconcilerError::Instance(BuildError::MissingMetadata("uid"))
    ));
    assert_eq!(store.len(), 0);
}
