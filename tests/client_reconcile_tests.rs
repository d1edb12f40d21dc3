//! # Client Reconciliation Tests
//!
//! Drives `KeycloakClient::apply` and `KeycloakClient::cleanup` against
//! in-memory stores and a fake Keycloak.

mod common;

use common::{client, password_from, persisted, realm, realm_ref, Harness};
use keycloak_config_operator::controller::reconciler::{Cleanup, KeycloakResource};
use keycloak_config_operator::crd::{KeycloakStatus, Realm, ResourceKey, SecretRef, SyncState};
use keycloak_config_operator::keycloak::KeycloakError;

/// Import `identity/acme` (admin password in `identity/kc-admin`) and publish it to the realm store
async fn imported_realm(harness: &Harness) -> Realm {
    harness
        .secrets
        .insert("identity", "kc-admin", "password", "hunter2");
    let acme = realm("identity", "acme", Some(password_from("kc-admin")));
    let status = acme.apply(&harness.reconciler).await;
    assert_eq!(status.state, SyncState::Success);
    let acme = persisted(acme, status);
    harness.realms.insert(acme.clone());
    acme
}

#[tokio::test]
async fn test_missing_realm_is_reported() {
    let harness = Harness::new();
    let storefront = client("shop", "storefront", realm_ref("acme", Some("identity")), None);

    let status = storefront.apply(&harness.reconciler).await;
    assert_eq!(status.state, SyncState::Error);
    assert_eq!(
        status.message.as_deref(),
        Some("Realm named acme does not exist in namespace identity.")
    );
    assert_eq!(harness.backend.connects(), 0);

    // Creating the realm later must re-trigger the client
    let dependents = harness
        .reconciler
        .client_realms
        .primaries_depending_on(&ResourceKey::new("identity", "acme"));
    assert!(dependents.contains(&ResourceKey::new("shop", "storefront")));
}

#[tokio::test]
async fn test_realm_ref_defaults_to_client_namespace() {
    let harness = Harness::new();
    let storefront = client("shop", "storefront", realm_ref("acme", None), None);

    let status = storefront.apply(&harness.reconciler).await;
    assert_eq!(
        status.message.as_deref(),
        Some("Realm named acme does not exist in namespace shop.")
    );
}

#[tokio::test]
async fn test_client_import_is_idempotent() {
    let harness = Harness::new();
    imported_realm(&harness).await;
    let storefront = client("shop", "storefront", realm_ref("acme", Some("identity")), None);

    let first = storefront.apply(&harness.reconciler).await;
    assert_eq!(first.state, SyncState::Success);
    let id = first.external_id.clone().expect("client id recorded");
    let creates = harness.backend.creates();

    let storefront = persisted(storefront, first);
    let second = storefront.apply(&harness.reconciler).await;
    assert_eq!(second.state, SyncState::Success);
    assert_eq!(second.external_id.as_deref(), Some(id.as_str()));
    assert_eq!(harness.backend.creates(), creates);

    let keycloak = harness.backend.keycloak.lock().unwrap();
    assert!(keycloak
        .clients
        .contains_key(&("acme".to_string(), id.clone())));
}

#[tokio::test]
async fn test_connection_comes_from_realm_and_secret_from_client_namespace() {
    let harness = Harness::new();
    imported_realm(&harness).await;
    harness
        .secrets
        .insert("shop", "storefront-oidc", "secret", "s3cr3t");
    let storefront = client(
        "shop",
        "storefront",
        realm_ref("acme", Some("identity")),
        Some(SecretRef::external("storefront-oidc", None, "secret")),
    );

    let status = storefront.apply(&harness.reconciler).await;
    assert_eq!(status.state, SyncState::Success);

    let used = harness.backend.last_connection();
    assert_eq!(used.password.as_ref().map(|p| p.as_str()), Some("hunter2"));

    let keycloak = harness.backend.keycloak.lock().unwrap();
    let id = status.external_id.expect("client id recorded");
    let stored = &keycloak.clients[&("acme".to_string(), id)];
    assert_eq!(stored.secret.as_ref().map(|s| s.as_str()), Some("s3cr3t"));
}

#[tokio::test]
async fn test_missing_client_secret_never_contacts_keycloak() {
    let harness = Harness::new();
    imported_realm(&harness).await;
    let connects = harness.backend.connects();
    let storefront = client(
        "shop",
        "storefront",
        realm_ref("acme", Some("identity")),
        Some(SecretRef::external("storefront-oidc", None, "secret")),
    );

    let status = storefront.apply(&harness.reconciler).await;
    assert_eq!(
        status.message.as_deref(),
        Some("The linked credential secret 'storefront-oidc' in namespace 'shop' does not exist.")
    );
    assert_eq!(harness.backend.connects(), connects);
    assert!(harness
        .reconciler
        .client_secrets
        .primaries_depending_on(&ResourceKey::new("shop", "storefront-oidc"))
        .contains(&ResourceKey::new("shop", "storefront")));
}

#[tokio::test]
async fn test_client_targets_realm_external_id() {
    let harness = Harness::new();
    harness
        .backend
        .keycloak
        .lock()
        .unwrap()
        .realms
        .insert("acme-legacy".to_string(), Default::default());
    let mut acme = realm("identity", "acme", None);
    acme.status = Some(KeycloakStatus {
        state: SyncState::Success,
        external_id: Some("acme-legacy".to_string()),
        ..KeycloakStatus::default()
    });
    harness.realms.insert(acme);
    let storefront = client("identity", "storefront", realm_ref("acme", None), None);

    let status = storefront.apply(&harness.reconciler).await;
    assert_eq!(status.state, SyncState::Success);
    let keycloak = harness.backend.keycloak.lock().unwrap();
    assert!(keycloak
        .clients
        .keys()
        .all(|(realm, _)| realm == "acme-legacy"));
}

#[tokio::test]
async fn test_cleanup_deletes_client() {
    let harness = Harness::new();
    imported_realm(&harness).await;
    let storefront = client("shop", "storefront", realm_ref("acme", Some("identity")), None);
    let status = storefront.apply(&harness.reconciler).await;
    let storefront = persisted(storefront, status);

    let outcome = storefront.cleanup(&harness.reconciler).await;
    assert_eq!(outcome, Cleanup::RemoveFinalizer);
    assert!(harness.backend.keycloak.lock().unwrap().clients.is_empty());
    assert!(harness.reconciler.client_realms.is_empty());
    assert!(harness.reconciler.client_secrets.is_empty());
}

#[tokio::test]
async fn test_cleanup_with_realm_gone_removes_finalizer() {
    let harness = Harness::new();
    imported_realm(&harness).await;
    let storefront = client("shop", "storefront", realm_ref("acme", Some("identity")), None);
    let status = storefront.apply(&harness.reconciler).await;
    let storefront = persisted(storefront, status);
    let connects = harness.backend.connects();

    harness.realms.remove("identity", "acme");
    let outcome = storefront.cleanup(&harness.reconciler).await;
    assert_eq!(outcome, Cleanup::RemoveFinalizer);
    assert_eq!(harness.backend.connects(), connects);
}

#[tokio::test]
async fn test_cleanup_failure_keeps_finalizer() {
    let harness = Harness::new();
    imported_realm(&harness).await;
    let storefront = client("shop", "storefront", realm_ref("acme", Some("identity")), None);
    let status = storefront.apply(&harness.reconciler).await;
    let storefront = persisted(storefront, status);

    harness
        .backend
        .fail_with(KeycloakError::http(503, "Service Unavailable", None));
    let Cleanup::KeepFinalizer(status) = storefront.cleanup(&harness.reconciler).await else {
        panic!("cleanup failure must keep the finalizer");
    };
    assert_eq!(status.state, SyncState::Error);
    assert_eq!(status.message.as_deref(), Some("HTTP 503 Service Unavailable"));
    assert!(status.external_id.is_some());
    assert_eq!(harness.backend.releases(), harness.backend.connects());
}
